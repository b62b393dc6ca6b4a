use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::driver::{DriverError, PageDriver};
use crate::records::{Record, RecordSet};

const MAX_RETRIES: u32 = 3;
const SCROLL_STEP_PX: u32 = 1000;
const SETTLE_DELAY: Duration = Duration::from_millis(1000);
const DISMISS_SETTLE: Duration = Duration::from_millis(500);

/// DOM markers handed to the driver. Defaults target twitter.com profile
/// pages; they are config so the loop itself stays free of markup
/// vocabulary.
#[derive(Debug, Clone)]
pub struct Markers {
    /// Repeating item container.
    pub item: String,
    /// Login prompt overlaid on logged-out profile views.
    pub login_wall: String,
    /// Close control on the login prompt.
    pub login_dismiss: String,
    /// Text shown to rejected automation clients.
    pub bot_wall_text: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            item: r#"article[data-testid="tweet"]"#.into(),
            login_wall: r#"div[data-testid="sheetDialog"]"#.into(),
            login_dismiss: r#"div[role="button"][aria-label="Close"]"#.into(),
            bot_wall_text: "This browser is no longer supported".into(),
        }
    }
}

/// Immutable description of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub subject: String,
    pub max_records: usize,
    /// Page-load / selector-wait deadline.
    pub timeout: Duration,
    /// Disable every deadline; the loop then ends only via retry
    /// exhaustion or the idle ceiling.
    pub slow_mode: bool,
    /// Zero new records for this long ends the loop as natural completion.
    pub idle_ceiling: Duration,
    pub markers: Markers,
}

impl ExtractConfig {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            max_records: 50,
            timeout: Duration::from_secs(30),
            slow_mode: false,
            idle_ceiling: Duration::from_secs(10),
            markers: Markers::default(),
        }
    }

    pub fn profile_url(&self) -> String {
        format!("https://twitter.com/{}", self.subject)
    }

    fn deadline(&self) -> Option<Duration> {
        if self.slow_mode {
            None
        } else {
            Some(self.timeout)
        }
    }
}

/// Terminal failure classes. A normally-completed run with zero records is
/// not a failure; it surfaces as `Success` with an empty record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    LoginWall,
    BotWall,
}

/// Result of one extraction run.
#[derive(Debug)]
pub enum Outcome {
    Success {
        records: Vec<Record>,
        /// Distinct records seen before clamping to `max_records`.
        discovered: usize,
    },
    Failure {
        kind: FailureKind,
        partial: Vec<Record>,
    },
}

/// Drive `driver` through repeated read/scroll cycles until `max_records`
/// distinct records are collected, retries are exhausted, or the page
/// stagnates. `on_progress` is called once per newly discovered record with
/// the running count. Driver errors never escape: a timeout after at least
/// one record was found is downgraded to a partial success, and a timeout
/// with nothing found is classified against the page's failure markers.
pub async fn extract<D, F>(driver: &mut D, config: &ExtractConfig, mut on_progress: F) -> Outcome
where
    D: PageDriver,
    F: FnMut(usize),
{
    info!(
        "extracting up to {} tweets for @{}",
        config.max_records, config.subject
    );

    if let Err(err) = driver.goto(&config.profile_url(), config.deadline()).await {
        // Nothing can have rendered before navigation resolved, so there is
        // nothing to salvage.
        if err.is_timeout() {
            warn!("navigation timed out");
            return Outcome::Failure {
                kind: FailureKind::Timeout,
                partial: Vec::new(),
            };
        }
        warn!("navigation failed: {err}");
        return classify_failure(driver, config).await;
    }

    dismiss_login_wall(driver, config).await;

    let mut set = RecordSet::new();
    match run_cycles(driver, config, &mut set, &mut on_progress).await {
        Ok(()) => {
            info!("extraction complete: {} tweets", set.len());
            success(set, config)
        }
        Err(err) => {
            warn!("extraction interrupted: {err}");
            salvage(driver, config, set, &mut on_progress).await
        }
    }
}

/// Single-shot, best-effort dismissal of the login prompt. Success is never
/// verified and failure is never fatal.
async fn dismiss_login_wall<D: PageDriver>(driver: &mut D, config: &ExtractConfig) {
    if let Ok(true) = driver.query(&config.markers.login_wall).await {
        debug!("login wall detected, attempting dismissal");
        if driver.click(&config.markers.login_dismiss).await.is_ok() {
            driver.wait(DISMISS_SETTLE).await;
        }
    }
}

/// The convergence loop: read everything rendered, dedup, then scroll for
/// more. Stagnant cycles burn retries; any new record resets both the retry
/// counter and the idle clock.
async fn run_cycles<D, F>(
    driver: &mut D,
    config: &ExtractConfig,
    set: &mut RecordSet,
    on_progress: &mut F,
) -> Result<(), DriverError>
where
    D: PageDriver,
    F: FnMut(usize),
{
    driver
        .wait_for_selector(&config.markers.item, config.deadline())
        .await?;

    let mut retries = 0u32;
    let mut last_new = Instant::now();

    while set.len() < config.max_records && retries < MAX_RETRIES {
        let added = read_cycle(driver, config, set, on_progress).await?;

        if added == 0 {
            retries += 1;
            if last_new.elapsed() >= config.idle_ceiling {
                info!("no new tweets for {:?}, stopping", config.idle_ceiling);
                break;
            }
        } else {
            retries = 0;
            last_new = Instant::now();
        }

        if set.len() < config.max_records && retries < MAX_RETRIES {
            driver.scroll_by(SCROLL_STEP_PX).await?;
            driver.wait(SETTLE_DELAY).await;
        }
    }

    Ok(())
}

/// Read all currently-rendered items and insert them. Returns how many were
/// new this cycle.
async fn read_cycle<D, F>(
    driver: &mut D,
    config: &ExtractConfig,
    set: &mut RecordSet,
    on_progress: &mut F,
) -> Result<usize, DriverError>
where
    D: PageDriver,
    F: FnMut(usize),
{
    let items = driver.read_items(&config.markers.item).await?;
    let mut added = 0;
    for item in items {
        if set.insert(item.content, item.observed_at) {
            added += 1;
            on_progress(set.len());
        }
    }
    Ok(added)
}

/// One best-effort read after an interruption: whatever rendered before the
/// deadline still counts. A non-empty set always wins over a failure.
async fn salvage<D, F>(
    driver: &mut D,
    config: &ExtractConfig,
    mut set: RecordSet,
    on_progress: &mut F,
) -> Outcome
where
    D: PageDriver,
    F: FnMut(usize),
{
    if let Err(err) = read_cycle(driver, config, &mut set, on_progress).await {
        debug!("salvage read failed: {err}");
    }

    if !set.is_empty() {
        info!("salvaged {} tweets from interrupted run", set.len());
        return success(set, config);
    }

    classify_failure(driver, config).await
}

/// Decide what an empty-handed interruption actually was. Order matters: an
/// explicit bot wall outranks a login prompt, which outranks a plain
/// timeout. Marker inspection is itself best-effort; if the page can no
/// longer be read, the failure stays a timeout.
async fn classify_failure<D: PageDriver>(driver: &mut D, config: &ExtractConfig) -> Outcome {
    let markup = driver.content().await.unwrap_or_default();
    let kind = if markup.contains(&config.markers.bot_wall_text) {
        FailureKind::BotWall
    } else if driver.query(&config.markers.login_wall).await.unwrap_or(false) {
        FailureKind::LoginWall
    } else {
        FailureKind::Timeout
    };
    warn!("extraction failed with nothing salvaged: {kind:?}");
    Outcome::Failure {
        kind,
        partial: Vec::new(),
    }
}

fn success(set: RecordSet, config: &ExtractConfig) -> Outcome {
    let discovered = set.len();
    Outcome::Success {
        records: set.into_truncated(config.max_records),
        discovered,
    }
}

// ── Tests ──
