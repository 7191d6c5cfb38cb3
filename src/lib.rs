//! # Kayak Flights Library
//!
//! Scrapes flight offers from Kayak's results page with a headless browser.
//! A search request is turned into a canonical search URL, the results page is
//! paginated through its "show more" control, and every result card inside the
//! requested window is mapped to a [`FlightResult`].

pub mod browser;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod parser;
pub mod report;
pub mod tool;
pub mod url;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use browser::{BrowserDriver, BrowserPage};
pub use client::FlightScraper;
pub use config::ScrapeConfig;
pub use parser::{FlightResponseParser, PageExtraction};
pub use report::{
    AirportRef, Baggage, FlightLeg, FlightMetadata, FlightResult, ReportStatus, ScrapeReport,
    StopDetail,
};
pub use url::{build_search_url, search_url};

#[cfg(feature = "chromium")]
pub use browser::chromium::ChromiumDriver;

/// Sentinel used for every text field the results page did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

static AIRPORT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("airport code pattern is valid"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));
static AIRLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{2}$").expect("airline code pattern is valid"));

/// Error types for the flights library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("Invalid search request: {0}")]
    Validation(String),

    #[error("Page failed to load: {0}")]
    TransientLoad(String),

    #[error("Browser operation failed: {0}")]
    Browser(String),

    #[error("HTML parsing failed: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlightError {
    fn validation(message: impl Into<String>) -> Self {
        FlightError::Validation(message.into())
    }
}

/// Returns true when `code` is a 3-letter uppercase IATA airport code
pub fn is_airport_code(code: &str) -> bool {
    AIRPORT_CODE_RE.is_match(code)
}

/// Returns true when `code` is a 2-character IATA airline code
pub fn is_airline_code(code: &str) -> bool {
    AIRLINE_CODE_RE.is_match(code)
}

/// Returns true when `date` has the `YYYY-MM-DD` shape
pub fn is_iso_date(date: &str) -> bool {
    DATE_RE.is_match(date)
}

/// Cabin class enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CabinClass {
    #[default]
    #[serde(rename = "economy")]
    Economy,
    #[serde(rename = "premium")]
    Premium,
    #[serde(rename = "business")]
    Business,
    #[serde(rename = "first")]
    First,
}

impl CabinClass {
    pub const ALL: [CabinClass; 4] = [
        CabinClass::Economy,
        CabinClass::Premium,
        CabinClass::Business,
        CabinClass::First,
    ];

    /// Path segment used in the search URL
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::Premium => "premium",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

impl FromStr for CabinClass {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium" | "premium-economy" | "premium_economy" => Ok(CabinClass::Premium),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(FlightError::validation(format!("Invalid cabin class: {}", s))),
        }
    }
}

/// Result ordering requested from the results page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOption {
    #[default]
    #[serde(rename = "bestflight_a")]
    BestFlight,
    #[serde(rename = "duration_a")]
    Quickest,
    #[serde(rename = "duration_b")]
    Slowest,
    #[serde(rename = "price_a")]
    Cheapest,
    #[serde(rename = "price_b")]
    MostExpensive,
    #[serde(rename = "depart_a")]
    EarliestTakeoff,
    #[serde(rename = "depart_b")]
    LatestTakeoff,
    #[serde(rename = "arrive_a")]
    EarliestLanding,
    #[serde(rename = "arrive_b")]
    LatestLanding,
    #[serde(rename = "departReturn_a")]
    EarliestReturnTakeoff,
    #[serde(rename = "departReturn_b")]
    LatestReturnTakeoff,
    #[serde(rename = "arriveReturn_a")]
    EarliestReturnLanding,
    #[serde(rename = "arriveReturn_b")]
    LatestReturnLanding,
}

impl SortOption {
    pub const ALL: [SortOption; 13] = [
        SortOption::BestFlight,
        SortOption::Quickest,
        SortOption::Slowest,
        SortOption::Cheapest,
        SortOption::MostExpensive,
        SortOption::EarliestTakeoff,
        SortOption::LatestTakeoff,
        SortOption::EarliestLanding,
        SortOption::LatestLanding,
        SortOption::EarliestReturnTakeoff,
        SortOption::LatestReturnTakeoff,
        SortOption::EarliestReturnLanding,
        SortOption::LatestReturnLanding,
    ];

    /// Value of the `sort` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::BestFlight => "bestflight_a",
            SortOption::Quickest => "duration_a",
            SortOption::Slowest => "duration_b",
            SortOption::Cheapest => "price_a",
            SortOption::MostExpensive => "price_b",
            SortOption::EarliestTakeoff => "depart_a",
            SortOption::LatestTakeoff => "depart_b",
            SortOption::EarliestLanding => "arrive_a",
            SortOption::LatestLanding => "arrive_b",
            SortOption::EarliestReturnTakeoff => "departReturn_a",
            SortOption::LatestReturnTakeoff => "departReturn_b",
            SortOption::EarliestReturnLanding => "arriveReturn_a",
            SortOption::LatestReturnLanding => "arriveReturn_b",
        }
    }
}

impl FromStr for SortOption {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(option) = SortOption::ALL
            .iter()
            .find(|option| option.as_str().eq_ignore_ascii_case(s))
        {
            return Ok(*option);
        }
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "best" | "best_flight" => Ok(SortOption::BestFlight),
            "quickest" => Ok(SortOption::Quickest),
            "slowest" => Ok(SortOption::Slowest),
            "cheapest" => Ok(SortOption::Cheapest),
            "most_expensive" => Ok(SortOption::MostExpensive),
            _ => Err(FlightError::validation(format!("Invalid sort option: {}", s))),
        }
    }
}

/// Airline alliance filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alliance {
    ValueAlliance,
    OneWorld,
    SkyTeam,
    StarAlliance,
}

impl Alliance {
    pub const ALL: [Alliance; 4] = [
        Alliance::ValueAlliance,
        Alliance::OneWorld,
        Alliance::SkyTeam,
        Alliance::StarAlliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Alliance::ValueAlliance => "VALUE_ALLIANCE",
            Alliance::OneWorld => "ONE_WORLD",
            Alliance::SkyTeam => "SKY_TEAM",
            Alliance::StarAlliance => "STAR_ALLIANCE",
        }
    }
}

impl FromStr for Alliance {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        Alliance::ALL
            .iter()
            .find(|alliance| alliance.as_str() == normalized)
            .copied()
            .ok_or_else(|| FlightError::validation(format!("Invalid alliance: {}", s)))
    }
}

/// Child fare category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChildType {
    /// Children aged 2-11
    #[serde(rename = "11")]
    Child,
    /// Toddlers under 2 in their own seat
    #[serde(rename = "1S")]
    ToddlerSeat,
    /// Infants under 2 on lap
    #[serde(rename = "1L")]
    InfantLap,
}

impl ChildType {
    pub const ALL: [ChildType; 3] = [ChildType::Child, ChildType::ToddlerSeat, ChildType::InfantLap];

    /// Code used in the passenger segment of the search URL
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildType::Child => "11",
            ChildType::ToddlerSeat => "1S",
            ChildType::InfantLap => "1L",
        }
    }
}

impl FromStr for ChildType {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "11" | "CHILD" => Ok(ChildType::Child),
            "1S" | "TODDLER_SEAT" => Ok(ChildType::ToddlerSeat),
            "1L" | "INFANT_LAP" => Ok(ChildType::InfantLap),
            _ => Err(FlightError::validation(format!(
                "Invalid child type: {} (expected '11', '1S' or '1L')",
                s
            ))),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(CabinClass, SortOption, Alliance, ChildType);

/// Passenger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub students: u32,
    pub children: Vec<ChildType>,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            students: 0,
            children: Vec::new(),
        }
    }
}

impl Passengers {
    pub fn adults(adults: u32) -> Self {
        Self {
            adults,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.adults as usize + self.students as usize + self.children.len()
    }

    pub fn validate(&self) -> Result<(), FlightError> {
        if self.total() == 0 {
            return Err(FlightError::validation("At least one passenger is required"));
        }
        Ok(())
    }
}

/// Optional result filters encoded into the `fs` query parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightFilters {
    pub carry_on_free: Option<u32>,
    pub checked_bags_free: Option<u32>,
    pub stops: Option<u32>,
    pub max_price: Option<u32>,
    pub alliance: Option<Alliance>,
    pub include_airlines: Option<BTreeSet<String>>,
    pub exclude_airlines: Option<BTreeSet<String>>,
    pub wifi_only: bool,
}

impl FlightFilters {
    pub fn validate(&self) -> Result<(), FlightError> {
        if self.max_price == Some(0) {
            return Err(FlightError::validation("Max price must be positive"));
        }
        for (label, codes) in [
            ("include_airlines", &self.include_airlines),
            ("exclude_airlines", &self.exclude_airlines),
        ] {
            if let Some(bad) = codes.iter().flatten().find(|code| !is_airline_code(code)) {
                return Err(FlightError::validation(format!(
                    "Invalid airline code in {}: {}",
                    label, bad
                )));
            }
        }
        Ok(())
    }
}

/// Complete flight search request with all parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub passengers: Passengers,
    pub cabin_class: CabinClass,
    pub sort_option: SortOption,
    pub filters: Option<FlightFilters>,
    pub start_index: usize,
    pub end_index: usize,
}

impl SearchRequest {
    /// One-way search for a single adult with default cabin, sort and window
    pub fn one_way(from: &str, to: &str, date: &str) -> Self {
        Self {
            departure_airport: from.to_string(),
            arrival_airport: to.to_string(),
            departure_date: date.to_string(),
            return_date: None,
            passengers: Passengers::default(),
            cabin_class: CabinClass::default(),
            sort_option: SortOption::default(),
            filters: None,
            start_index: 0,
            end_index: 15,
        }
    }

    /// Round-trip variant of [`SearchRequest::one_way`]
    pub fn round_trip(from: &str, to: &str, depart: &str, return_date: &str) -> Self {
        Self {
            return_date: Some(return_date.to_string()),
            ..Self::one_way(from, to, depart)
        }
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }

    /// Number of result cards that must be materialized to cover the window
    pub fn target_results(&self) -> usize {
        self.end_index.saturating_add(1)
    }

    /// Check every invariant of the request without touching the network
    pub fn validate(&self) -> Result<(), FlightError> {
        if !is_airport_code(&self.departure_airport) {
            return Err(FlightError::validation(format!(
                "Invalid departure airport code: {}",
                self.departure_airport
            )));
        }
        if !is_airport_code(&self.arrival_airport) {
            return Err(FlightError::validation(format!(
                "Invalid arrival airport code: {}",
                self.arrival_airport
            )));
        }
        if !is_iso_date(&self.departure_date) {
            return Err(FlightError::validation(format!(
                "Invalid departure date format: {}",
                self.departure_date
            )));
        }
        if let Some(return_date) = &self.return_date {
            if !is_iso_date(return_date) {
                return Err(FlightError::validation(format!(
                    "Invalid return date format: {}",
                    return_date
                )));
            }
        }
        if self.end_index < self.start_index {
            return Err(FlightError::validation(format!(
                "end_index ({}) must be greater than or equal to start_index ({})",
                self.end_index, self.start_index
            )));
        }
        self.passengers.validate()?;
        if let Some(filters) = &self.filters {
            filters.validate()?;
        }
        Ok(())
    }
}

/// Main public API function: scrape with a fresh headless Chrome session
#[cfg(feature = "chromium")]
pub async fn scrape_flights(request: SearchRequest) -> Result<ScrapeReport, FlightError> {
    let config = ScrapeConfig::from_env();
    let driver = ChromiumDriver::new(config.headless);
    FlightScraper::new(driver, config)?.scrape(request).await
}
