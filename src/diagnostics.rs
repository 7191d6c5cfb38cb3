//! Optional diagnostic artifacts written next to a scrape
//!
//! Nothing here is part of the result contract: every failure is logged and
//! swallowed so a read-only disk never changes a report.

use crate::browser::BrowserPage;
use crate::report::{FlightLeg, ScrapeReport};
use crate::{FlightError, NOT_AVAILABLE};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REPORT_JSON_FILE: &str = "flights_data.json";
pub const REPORT_CSV_FILE: &str = "flights_data.csv";

const CSV_HEADER: [&str; 9] = [
    "price",
    "fareTypes",
    "availableSites",
    "carryOn",
    "checkedBags",
    "outbound_departureTime",
    "outbound_duration",
    "return_departureTime",
    "return_duration",
];

/// Writes snapshots into a directory; disabled when no directory is configured
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Save `<prefix>_screenshot<suffix>.png` and `<prefix>_page<suffix>.html`
    pub async fn capture_page<P: BrowserPage + ?Sized>(&self, page: &P, prefix: &str, suffix: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        match page.screenshot().await {
            Ok(png) => {
                let path = dir.join(format!("{}_screenshot{}.png", prefix, suffix));
                write_logged(&path, png).await;
            }
            Err(e) => warn!("Could not capture screenshot: {}", e),
        }
        match page.content().await {
            Ok(html) => {
                let path = dir.join(format!("{}_page{}.html", prefix, suffix));
                write_logged(&path, html.into_bytes()).await;
            }
            Err(e) => warn!("Could not capture page source: {}", e),
        }
    }

    /// Persist the report as a JSON snapshot and a flattened CSV table
    pub async fn write_report(&self, report: &ScrapeReport) {
        let Some(dir) = &self.dir else {
            return;
        };
        match serde_json::to_vec_pretty(report) {
            Ok(json) => write_logged(&dir.join(REPORT_JSON_FILE), json).await,
            Err(e) => warn!("Could not serialize report: {}", e),
        }
        write_logged(&dir.join(REPORT_CSV_FILE), report_to_csv(report).into_bytes()).await;
        info!(dir = %dir.display(), "Report artifacts saved");
    }
}

async fn write_logged(path: &Path, bytes: Vec<u8>) {
    if let Err(e) = write_file(path, bytes).await {
        warn!(path = %path.display(), "Failed to write diagnostic artifact: {}", e);
    } else {
        debug!(path = %path.display(), "Diagnostic artifact written");
    }
}

async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), FlightError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// One CSV row per flight; a failure report yields an empty document
pub fn report_to_csv(report: &ScrapeReport) -> String {
    if report.flights.is_empty() {
        return String::new();
    }

    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for flight in &report.flights {
        let (return_departure, return_duration) = leg_timing(flight.return_flight.as_ref());
        let row = [
            flight.price.clone(),
            flight.fare_types.join(", "),
            flight.available_sites.to_string(),
            flight.baggage.carry_on.to_string(),
            flight.baggage.checked_bags.to_string(),
            flight.outbound_flight.departure_time.clone(),
            flight.outbound_flight.duration.clone(),
            return_departure,
            return_duration,
        ];
        let fields: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn leg_timing(leg: Option<&FlightLeg>) -> (String, String) {
    match leg {
        Some(leg) => (leg.departure_time.clone(), leg.duration.clone()),
        None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
