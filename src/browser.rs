//! Browser capability used by the scraper
//!
//! The orchestrator only needs a handful of page operations, so they live
//! behind [`BrowserPage`]. Production code drives Chrome through
//! chromiumoxide; tests drive a scripted page.

use crate::FlightError;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "chromium")]
pub mod chromium;

/// Opens one browser session (and one page) per scrape
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Page: BrowserPage + 'static;

    async fn open(&self) -> Result<Self::Page, FlightError>;
}

/// Page operations the scraper relies on
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the DOM to be ready
    async fn goto(&self, url: &str) -> Result<(), FlightError>;

    /// Wait until `selector` matches at least one element
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), FlightError>;

    /// Number of elements currently matching `selector`
    async fn count(&self, selector: &str) -> Result<usize, FlightError>;

    /// Click the first element matching `selector`; `Ok(false)` when none matches
    async fn click(&self, selector: &str) -> Result<bool, FlightError>;

    async fn scroll_by(&self, pixels: i64) -> Result<(), FlightError>;

    /// Serialized HTML of the current document
    async fn content(&self) -> Result<String, FlightError>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> Result<Vec<u8>, FlightError>;

    /// Release the page and its browser
    async fn close(&self) -> Result<(), FlightError>;

    async fn exists(&self, selector: &str) -> Result<bool, FlightError> {
        Ok(self.count(selector).await? > 0)
    }
}
