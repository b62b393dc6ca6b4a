use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// One item as read off the page, before dedup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub content: String,
    #[serde(default)]
    pub observed_at: Option<String>,
}

/// Errors surfaced by a page driver. The extraction loop only distinguishes
/// deadlines from everything else; no raw driver error escapes it.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("deadline exceeded")]
    Timeout,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout)
    }

    pub fn other(op: &str, err: impl std::fmt::Display) -> Self {
        DriverError::Other(anyhow!("{op}: {err}"))
    }
}

/// Capability surface the extraction loop drives. The real implementation
/// talks CDP to a browser; tests script an in-memory fake. A `None` timeout
/// means no deadline at all (slow mode).
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait for the page to settle.
    async fn goto(&mut self, url: &str, timeout: Option<Duration>) -> Result<(), DriverError>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<(), DriverError>;

    /// Whether any element currently matches `selector`.
    async fn query(&mut self, selector: &str) -> Result<bool, DriverError>;

    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Extract `(content, observed_at)` from every rendered element matching
    /// the item marker, in document order.
    async fn read_items(&mut self, selector: &str) -> Result<Vec<RawItem>, DriverError>;

    async fn scroll_by(&mut self, pixels: u32) -> Result<(), DriverError>;

    /// Pause between cycles; fakes may return immediately.
    async fn wait(&mut self, duration: Duration);

    /// Raw page markup, for failure-marker inspection.
    async fn content(&mut self) -> Result<String, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}
