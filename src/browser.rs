use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::driver::{DriverError, PageDriver, RawItem};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

// Sub-selectors applied inside each item container.
const TEXT_SELECTOR: &str = r#"div[data-testid="tweetText"]"#;
const TIME_SELECTOR: &str = "time";

/// `PageDriver` backed by a Chromium instance over CDP. One browser, one
/// page, owned for the lifetime of a single run.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch a browser and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|e| anyhow!(e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        // The CDP event stream must be drained for the connection to make
        // progress; it ends when the browser goes away.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open a page")?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&mut self, url: &str, timeout: Option<Duration>) -> Result<(), DriverError> {
        debug!("navigating to {url}");
        let nav = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| DriverError::other("goto", e))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| DriverError::other("wait_for_navigation", e))?;
            Ok(())
        };
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, nav).await {
                Ok(result) => result,
                Err(_) => Err(DriverError::Timeout),
            },
            None => nav.await,
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<(), DriverError> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    debug!("selector {selector} never attached");
                    return Err(DriverError::Timeout);
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query(&mut self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::other("find_element", e))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::other("click", e))?;
        Ok(())
    }

    async fn read_items(&mut self, selector: &str) -> Result<Vec<RawItem>, DriverError> {
        let js = format!(
            r#"Array.from(document.querySelectorAll('{selector}')).map(el => ({{
                content: el.querySelector('{TEXT_SELECTOR}')?.textContent || '',
                observedAt: el.querySelector('{TIME_SELECTOR}')?.getAttribute('datetime') || null,
            }}))"#
        );
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::other("read_items", e))?;
        result
            .into_value::<Vec<RawItem>>()
            .map_err(|e| DriverError::other("read_items decode", e))
    }

    async fn scroll_by(&mut self, pixels: u32) -> Result<(), DriverError> {
        self.page
            .evaluate(format!("window.scrollBy(0, {pixels})"))
            .await
            .map_err(|e| DriverError::other("scroll_by", e))?;
        Ok(())
    }

    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::other("content", e))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.browser
            .close()
            .await
            .map_err(|e| DriverError::other("close", e))?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// Probe the usual install locations for a Chromium-family executable, the
/// same way chromiumoxide's own detection does.
pub fn find_browser() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHROME") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let names = [
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
        "chrome",
        "brave-browser",
    ];
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    // macOS app bundles are not on PATH.
    let bundles = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    bundles
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}
