//! Scraper configuration

use crate::parser::BASE_URL;
use crate::url::BASE_SEARCH_URL;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Timeouts, retry policy and output locations for one [`crate::FlightScraper`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// Base of the search URL (`.../flights`)
    pub search_base_url: String,
    /// Origin that relative booking links are resolved against
    pub booking_origin: String,
    pub navigation_timeout: Duration,
    pub results_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Wait after clicking "show more" before recounting cards
    pub settle_delay: Duration,
    pub max_show_more_clicks: u32,
    /// Where report snapshots and failure screenshots go; `None` disables them
    pub diagnostics_dir: Option<PathBuf>,
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_base_url: BASE_SEARCH_URL.to_string(),
            booking_origin: BASE_URL.to_string(),
            navigation_timeout: Duration::from_secs(60),
            results_timeout: Duration::from_secs(60),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
            max_show_more_clicks: 50,
            diagnostics_dir: None,
            headless: true,
        }
    }
}

impl ScrapeConfig {
    /// Defaults overridden by `KAYAK_FLIGHTS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ScrapeConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("KAYAK_FLIGHTS_SEARCH_URL") {
            config.search_base_url = url;
        }
        if let Some(origin) = lookup("KAYAK_FLIGHTS_ORIGIN") {
            config.booking_origin = origin;
        }
        if let Some(secs) = parse_var(&lookup, "KAYAK_FLIGHTS_NAVIGATION_TIMEOUT_SECS") {
            config.navigation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "KAYAK_FLIGHTS_RESULTS_TIMEOUT_SECS") {
            config.results_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_u32_var(&lookup, "KAYAK_FLIGHTS_MAX_ATTEMPTS") {
            config.max_attempts = attempts.max(1);
        }
        if let Some(ms) = parse_var(&lookup, "KAYAK_FLIGHTS_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "KAYAK_FLIGHTS_SETTLE_DELAY_MS") {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(clicks) = parse_u32_var(&lookup, "KAYAK_FLIGHTS_MAX_SHOW_MORE") {
            config.max_show_more_clicks = clicks;
        }
        if let Some(dir) = lookup("KAYAK_FLIGHTS_DIAGNOSTICS_DIR").filter(|dir| !dir.is_empty()) {
            config.diagnostics_dir = Some(PathBuf::from(dir));
        }
        if let Some(headless) = lookup("KAYAK_FLIGHTS_HEADLESS") {
            config.headless = !matches!(headless.to_lowercase().as_str(), "0" | "false" | "no");
        }

        config
    }

    /// Configuration with every delay removed, for scripted pages
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(5),
            results_timeout: Duration::from_secs(5),
            retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring non-numeric configuration value");
            None
        }
    }
}

fn parse_u32_var<F>(lookup: &F, key: &str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, key)?;
    match u32::try_from(value) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value, "Ignoring out-of-range configuration value");
            None
        }
    }
}
