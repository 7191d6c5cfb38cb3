//! Headless Chrome implementation of the browser capability

use crate::browser::{BrowserDriver, BrowserPage};
use crate::FlightError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn browser_error(context: &str, e: impl std::fmt::Display) -> FlightError {
    FlightError::Browser(format!("{}: {}", context, e))
}

/// Launches a fresh Chrome process for every session
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    headless: bool,
}

impl ChromiumDriver {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

impl Default for ChromiumDriver {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Page = ChromiumPage;

    async fn open(&self) -> Result<ChromiumPage, FlightError> {
        info!(headless = self.headless, "Launching browser");

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(Duration::from_secs(60))
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg("--lang=en-US")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| browser_error("Failed to build browser config", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("Failed to launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error (continuing): {}", e);
                }
            }
            debug!("Browser event handler task completed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(browser_error("Failed to create page", e));
            }
        };

        Ok(ChromiumPage {
            browser: Mutex::new(Some(browser)),
            page,
            handler: handler_task,
        })
    }
}

/// One Chrome page plus the browser that owns it
pub struct ChromiumPage {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), FlightError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| FlightError::TransientLoad(format!("Navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), FlightError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_elements(selector).await {
                Ok(elements) if !elements.is_empty() => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(selector, "Selector query failed while waiting: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(FlightError::TransientLoad(format!(
                    "Timed out after {:?} waiting for {}",
                    timeout, selector
                )));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, FlightError> {
        self.page
            .find_elements(selector)
            .await
            .map(|elements| elements.len())
            .map_err(|e| browser_error("Element query failed", e))
    }

    async fn click(&self, selector: &str) -> Result<bool, FlightError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| browser_error("Element query failed", e))?;
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| browser_error("Click failed", e))?;
        Ok(true)
    }

    async fn scroll_by(&self, pixels: i64) -> Result<(), FlightError> {
        let script = format!("window.scrollBy(0, {})", pixels);
        self.page
            .evaluate(script.as_str())
            .await
            .map_err(|e| browser_error("Scroll failed", e))?;
        Ok(())
    }

    async fn content(&self) -> Result<String, FlightError> {
        self.page
            .content()
            .await
            .map_err(|e| browser_error("Failed to read page content", e))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, FlightError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| browser_error("Screenshot failed", e))
    }

    async fn close(&self) -> Result<(), FlightError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        info!("Closing browser");
        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| browser_error("Failed to close browser", e));
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        result
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
