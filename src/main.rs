mod browser;
mod driver;
mod ingest;
mod markdown;
mod records;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::ChromeDriver;
use crate::driver::PageDriver;
use crate::ingest::{extract, ExtractConfig, FailureKind, Outcome};

const RESULTS_SAVED_MARKER: &str = "TWEETS_SAVED:";
const OUTPUT_SUBDIR: &str = "tweetingest";

// Bare handle, @handle, or a full twitter.com / x.com profile URL.
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?(?:twitter|x)\.com/)?@?([A-Za-z0-9_]{1,15})/?$").unwrap()
});

#[derive(Parser)]
#[command(
    name = "tweetingest",
    version,
    disable_version_flag = true,
    about = "Scrape a user's tweets into a single markdown transcript"
)]
struct Cli {
    /// Twitter username, @handle, or profile URL (prompted if omitted)
    username: Option<String>,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version, value_parser = clap::value_parser!(bool))]
    version: Option<bool>,

    /// Maximum number of tweets to scrape
    #[arg(short = 'm', long = "max-tweets", default_value_t = 50)]
    max_tweets: usize,

    /// Page-load timeout in seconds
    #[arg(short = 't', long, default_value_t = 30)]
    timeout: u64,

    /// Headful browser, no timeouts, verbose logging
    #[arg(long)]
    debug: bool,

    /// Print the final markdown to stdout
    #[arg(short, long)]
    pipe: bool,

    /// Don't open the saved file in an editor
    #[arg(short = 'n', long = "no-editor")]
    no_editor: bool,

    /// Copy the final markdown to the clipboard
    #[arg(short = 'y', long)]
    clipboard: bool,

    /// Check that a usable browser is installed, then exit
    #[arg(long)]
    install: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if cli.debug {
                    "debug".into()
                } else {
                    "info".into()
                }
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.install {
        return run_install();
    }

    if cli.max_tweets == 0 {
        bail!("--max-tweets must be positive");
    }

    let subject = match resolve_subject(cli.username.as_deref())? {
        Some(subject) => subject,
        None => {
            println!("Operation cancelled.");
            return Ok(());
        }
    };

    let mut config = ExtractConfig::new(subject.clone());
    config.max_records = cli.max_tweets;
    config.timeout = Duration::from_secs(cli.timeout);
    config.slow_mode = cli.debug;

    if cli.debug {
        debug!("subject: {subject}");
        debug!("config: {config:?}");
    }

    let t0 = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Scraping tweets from @{subject}..."));

    let mut chrome = ChromeDriver::launch(!cli.debug)
        .await
        .context("failed to launch browser")?;

    let progress = spinner.clone();
    let outcome = extract(&mut chrome, &config, move |count| {
        progress.set_message(format!("Scraped {count} tweets..."));
    })
    .await;

    // Closed on every exit path; `extract` never bypasses this.
    if let Err(err) = chrome.close().await {
        warn!("browser close failed: {err}");
    }

    let records = match outcome {
        Outcome::Success {
            records,
            discovered,
        } => {
            spinner.finish_with_message(format!("Scraped {} tweets.", records.len()));
            if discovered > records.len() {
                debug!("discovered {discovered}, kept {}", records.len());
            }
            records
        }
        Outcome::Failure { kind, .. } => {
            spinner.finish_and_clear();
            eprintln!("{}", failure_message(kind));
            std::process::exit(1);
        }
    };

    let document = markdown::build(&subject, &records, Local::now());

    let dir = output_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!(
        "tweetingest-{}-{}.md",
        subject,
        Utc::now().timestamp_millis()
    ));
    std::fs::write(&path, &document)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if cli.clipboard {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(document.clone())) {
            Ok(()) => println!("Output copied to clipboard!"),
            Err(err) => warn!("failed to copy to clipboard: {err}"),
        }
    }

    if cli.pipe {
        println!("{document}");
    } else {
        println!("{RESULTS_SAVED_MARKER} {}", path.display());
        if !cli.no_editor {
            open_in_editor(&path);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("Done in {}", format_duration(elapsed));
    }

    Ok(())
}

/// Resolve the subject from the positional argument, falling back to an
/// interactive prompt. `None` means the user cancelled the prompt.
fn resolve_subject(arg: Option<&str>) -> Result<Option<String>> {
    if let Some(raw) = arg {
        return normalize_subject(raw).map(Some);
    }

    let input = dialoguer::Input::<String>::new()
        .with_prompt("Enter a Twitter username (without @)")
        .validate_with(|value: &String| {
            if value.trim().is_empty() {
                Err("Please provide a username")
            } else {
                Ok(())
            }
        })
        .interact_text();

    match input {
        Ok(value) => normalize_subject(&value).map(Some),
        Err(_) => Ok(None),
    }
}

/// Accept `user`, `@user`, or a full profile URL; return the bare handle.
fn normalize_subject(raw: &str) -> Result<String> {
    SUBJECT_RE
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| anyhow!("'{raw}' does not look like a Twitter username or profile URL"))
}

fn failure_message(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Timeout => {
            "Timed out waiting for tweets to load. Try a larger --timeout value."
        }
        FailureKind::LoginWall => {
            "Twitter is demanding a login for this profile; it cannot be scraped anonymously."
        }
        FailureKind::BotWall => {
            "Twitter rejected the automated browser; this profile cannot be scraped right now."
        }
    }
}

fn output_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(OUTPUT_SUBDIR))
        .ok_or_else(|| anyhow!("could not resolve a config directory"))
}

/// Open the saved transcript in $EDITOR/$VISUAL, if either is set.
fn open_in_editor(path: &Path) {
    let Some(editor) = std::env::var_os("EDITOR").or_else(|| std::env::var_os("VISUAL")) else {
        return;
    };
    if let Err(err) = std::process::Command::new(&editor).arg(path).status() {
        warn!("failed to open {editor:?}: {err}");
    }
}

/// `--install`: confirm a usable Chromium-family browser is present.
fn run_install() -> Result<()> {
    let Some(path) = browser::find_browser() else {
        eprintln!("No Chrome, Chromium, or Brave executable found. Install one and re-run.");
        std::process::exit(1);
    };

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Use the browser at {}?", path.display()))
        .default(true)
        .interact()
        .unwrap_or(false);

    if !confirmed {
        eprintln!("Install aborted.");
        std::process::exit(1);
    }

    println!("Browser found: {}", path.display());
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_common_subject_shapes() {
        for raw in [
            "jack",
            "@jack",
            "https://twitter.com/jack",
            "https://x.com/jack/",
            "http://www.twitter.com/jack",
        ] {
            assert_eq!(normalize_subject(raw).unwrap(), "jack", "input: {raw}");
        }
    }

    #[test]
    fn normalize_rejects_garbage() {
        for raw in ["", "not a user name", "https://example.com/jack", "@@jack"] {
            assert!(normalize_subject(raw).is_err(), "input: {raw}");
        }
    }

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(Duration::from_millis(2_300)), "2.3s");
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15s");
    }
}
