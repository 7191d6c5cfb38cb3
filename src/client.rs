//! Scrape orchestrator: navigation, pagination and extraction
//!
//! One call to [`FlightScraper::scrape`] owns one browser session from open to
//! close. Only request validation surfaces as an `Err`; every other failure
//! becomes a `no_flights_found` report.

use crate::browser::{BrowserDriver, BrowserPage};
use crate::config::ScrapeConfig;
use crate::diagnostics::Diagnostics;
use crate::parser::{FlightResponseParser, RESULT_CARD_SELECTOR, SHOW_MORE_SELECTOR};
use crate::report::{FlightResult, ScrapeReport};
use crate::url::build_search_url;
use crate::{FlightError, SearchRequest};
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

const SCROLL_PIXELS: i64 = 1000;

/// Result of the navigation phase
#[derive(Debug)]
enum LoadState {
    Ready,
    NoResults,
    Failed { attempts: u32, last_error: String },
}

/// What a scrape produced before it is wrapped into a report
#[derive(Debug)]
enum ScrapeOutcome {
    Flights {
        flights: Vec<FlightResult>,
        total_results: usize,
        message: Option<String>,
    },
    NoFlights(String),
}

/// Browser-driven flight scraper
pub struct FlightScraper<D: BrowserDriver> {
    driver: D,
    parser: FlightResponseParser,
    config: ScrapeConfig,
    diagnostics: Diagnostics,
}

impl<D: BrowserDriver> FlightScraper<D> {
    pub fn new(driver: D, config: ScrapeConfig) -> Result<Self, FlightError> {
        debug!("Creating new flight scraper");
        let parser = FlightResponseParser::with_origin(&config.booking_origin)?;
        let diagnostics = Diagnostics::new(config.diagnostics_dir.clone());
        if diagnostics.is_enabled() {
            info!(dir = ?config.diagnostics_dir, "Diagnostic artifacts enabled");
        }
        Ok(Self {
            driver,
            parser,
            config,
            diagnostics,
        })
    }

    /// Scrape the result window described by `request`.
    ///
    /// Returns `Err` only for [`FlightError::Validation`], before any browser
    /// is launched.
    #[instrument(
        level = "info",
        skip(self, request),
        fields(
            from = %request.departure_airport,
            to = %request.arrival_airport,
            start = request.start_index,
            end = request.end_index
        )
    )]
    pub async fn scrape(&self, request: SearchRequest) -> Result<ScrapeReport, FlightError> {
        let search_url = build_search_url(&self.config.search_base_url, &request)?;
        info!(url = %search_url, "Generated search URL");

        let started = Instant::now();
        let outcome = match self.driver.open().await {
            Ok(page) => {
                let outcome = self.run(&page, &search_url, &request).await;
                if let Err(e) = page.close().await {
                    warn!("Failed to close browser session: {}", e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        let report = match outcome {
            Ok(ScrapeOutcome::Flights {
                flights,
                total_results,
                message,
            }) => ScrapeReport::success(flights, total_results, message, search_url, request),
            Ok(ScrapeOutcome::NoFlights(message)) => {
                ScrapeReport::no_flights_found(message, search_url, request)
            }
            Err(e) => {
                error!(error = %e, "Error during scraping");
                ScrapeReport::no_flights_found(format!("Error occurred: {}", e), search_url, request)
            }
        };

        info!(
            status = ?report.status,
            flights = report.flights.len(),
            total_results = report.total_results,
            duration_ms = started.elapsed().as_millis(),
            "Scrape finished"
        );

        self.diagnostics.write_report(&report).await;
        Ok(report)
    }

    async fn run(
        &self,
        page: &D::Page,
        search_url: &str,
        request: &SearchRequest,
    ) -> Result<ScrapeOutcome, FlightError> {
        match self.navigate(page, search_url).await {
            LoadState::Ready => {}
            LoadState::NoResults => {
                warn!("Results page reports no flights");
                return Ok(ScrapeOutcome::NoFlights(
                    "No flights available for the specified parameters".to_string(),
                ));
            }
            LoadState::Failed {
                attempts,
                last_error,
            } => {
                error!(attempts, "Failed to load page after multiple attempts");
                return Ok(ScrapeOutcome::NoFlights(format!(
                    "Failed to load results page after {} attempts: {}",
                    attempts, last_error
                )));
            }
        }

        let materialized = self.paginate(page, request.target_results()).await?;
        debug!(materialized, "Pagination finished");

        self.extract(page, request).await
    }

    /// Bounded retry loop around [`Self::load_attempt`]
    async fn navigate(&self, page: &D::Page, search_url: &str) -> LoadState {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            info!(attempt, "Navigating to results page");
            match self.load_attempt(page, search_url).await {
                Ok(state) => return state,
                Err(e) => {
                    error!(attempt, error = %e, "Navigation attempt failed");
                    self.diagnostics
                        .capture_page(page, "timeout", &format!("_attempt_{}", attempt))
                        .await;
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        LoadState::Failed {
            attempts: max_attempts,
            last_error,
        }
    }

    async fn load_attempt(&self, page: &D::Page, search_url: &str) -> Result<LoadState, FlightError> {
        let nav_timeout = self.config.navigation_timeout;
        timeout(nav_timeout, page.goto(search_url))
            .await
            .map_err(|_| {
                FlightError::TransientLoad(format!("Navigation timed out after {:?}", nav_timeout))
            })??;

        debug!("Simulating user scroll");
        page.scroll_by(SCROLL_PIXELS).await?;

        let html = page.content().await?;
        if self.parser.has_no_results(&html) {
            return Ok(LoadState::NoResults);
        }

        debug!("Waiting for flight results");
        let results_timeout = self.config.results_timeout;
        timeout(
            results_timeout,
            page.wait_for_selector(RESULT_CARD_SELECTOR, results_timeout),
        )
        .await
        .map_err(|_| {
            FlightError::TransientLoad(format!(
                "Flight results container not found after {:?}",
                results_timeout
            ))
        })??;

        info!("Flight results found");
        Ok(LoadState::Ready)
    }

    /// Click "show more" until `target` cards exist or the page stops growing.
    /// Returns the number of cards materialized.
    async fn paginate(&self, page: &D::Page, target: usize) -> Result<usize, FlightError> {
        let mut current = page.count(RESULT_CARD_SELECTOR).await?;
        let mut clicks = 0;

        loop {
            info!(current, target, "Result cards materialized");
            if current >= target {
                break;
            }
            if clicks >= self.config.max_show_more_clicks {
                warn!(clicks, "Show more click limit reached");
                break;
            }
            if !page.exists(SHOW_MORE_SELECTOR).await? {
                debug!("No show more control on page");
                break;
            }

            info!("Clicking 'Show more results' button");
            match page.click(SHOW_MORE_SELECTOR).await {
                Ok(true) => clicks += 1,
                Ok(false) => break,
                Err(e) => {
                    warn!("Failed to click 'Show more' button: {}", e);
                    self.diagnostics.capture_page(page, "show_more_error", "").await;
                    break;
                }
            }

            sleep(self.config.settle_delay).await;

            let after = page.count(RESULT_CARD_SELECTOR).await?;
            if after <= current {
                warn!(before = current, after, "No new results loaded after clicking 'Show more'");
                break;
            }
            current = after;
        }

        Ok(current)
    }

    async fn extract(&self, page: &D::Page, request: &SearchRequest) -> Result<ScrapeOutcome, FlightError> {
        let html = page.content().await?;
        let extraction = self
            .parser
            .extract_window(&html, request.start_index, request.end_index);

        if extraction.total_results == 0 {
            warn!("No flight result items found");
            self.diagnostics.capture_page(page, "no_results", "").await;
            return Ok(ScrapeOutcome::NoFlights(
                "No flight results found for the specified parameters".to_string(),
            ));
        }

        info!(
            total_results = extraction.total_results,
            extracted = extraction.flights.len(),
            skipped = extraction.skipped,
            "Total available results"
        );

        Ok(ScrapeOutcome::Flights {
            message: window_message(request.end_index, extraction.total_results),
            flights: extraction.flights,
            total_results: extraction.total_results,
        })
    }
}

/// Advisory attached when the page holds fewer cards than the window needs
fn window_message(end_index: usize, total_results: usize) -> Option<String> {
    (total_results < end_index.saturating_add(1)).then(|| {
        format!(
            "Requested up to index {}, but only {} results available.",
            end_index, total_results
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_message() {
        assert_eq!(window_message(15, 16), None);
        assert_eq!(window_message(15, 40), None);
        assert_eq!(
            window_message(75, 60).as_deref(),
            Some("Requested up to index 75, but only 60 results available.")
        );
    }

    #[test]
    fn test_window_message_at_usize_max() {
        assert!(window_message(usize::MAX, 60).is_some());
        assert!(window_message(usize::MAX, usize::MAX).is_none());
    }
}
