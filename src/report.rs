//! Structured results produced by a scrape

use crate::{SearchRequest, NOT_AVAILABLE};
use serde::{Deserialize, Serialize};

/// Airport code and display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportRef {
    pub code: String,
    pub name: String,
}

impl AirportRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// The "N/A" pair used when the page did not resolve an airport
    pub fn unknown() -> Self {
        Self::new(NOT_AVAILABLE, NOT_AVAILABLE)
    }

    pub fn is_unknown(&self) -> bool {
        self.code == NOT_AVAILABLE
    }
}

/// One layover on a leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetail {
    pub airport_code: String,
    pub airport_name: String,
    pub layover_duration: String,
}

/// One directional segment of a trip.
///
/// `stop_details` may hold fewer entries than `stops` when the page markup is
/// incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightLeg {
    pub departure_time: String,
    pub departure_airport: AirportRef,
    pub arrival_time: String,
    pub arrival_airport: AirportRef,
    pub duration: String,
    pub airlines: Vec<String>,
    pub stops: u32,
    pub stop_details: Vec<StopDetail>,
    pub next_day_arrival: bool,
}

impl Default for FlightLeg {
    fn default() -> Self {
        Self {
            departure_time: NOT_AVAILABLE.to_string(),
            departure_airport: AirportRef::unknown(),
            arrival_time: NOT_AVAILABLE.to_string(),
            arrival_airport: AirportRef::unknown(),
            duration: NOT_AVAILABLE.to_string(),
            airlines: vec![NOT_AVAILABLE.to_string()],
            stops: 0,
            stop_details: Vec::new(),
            next_day_arrival: false,
        }
    }
}

impl FlightLeg {
    /// True when both times were found on the page
    pub fn has_schedule(&self) -> bool {
        self.departure_time != NOT_AVAILABLE && self.arrival_time != NOT_AVAILABLE
    }
}

/// Free baggage allowance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baggage {
    pub carry_on: u32,
    pub checked_bags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightMetadata {
    pub multiple_airlines: bool,
    pub booking_button_text: String,
}

/// One flight offer (result card)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightResult {
    pub price: String,
    pub fare_types: Vec<String>,
    pub available_sites: u32,
    pub baggage: Baggage,
    pub booking_link: String,
    pub outbound_flight: FlightLeg,
    pub return_flight: Option<FlightLeg>,
    pub metadata: FlightMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    NoFlightsFound,
}

/// Outcome of one scrape invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flights: Vec<FlightResult>,
    pub total_results: usize,
    pub message: Option<String>,
    pub search_url: String,
    pub search_parameters: SearchRequest,
}

impl ScrapeReport {
    pub fn success(
        flights: Vec<FlightResult>,
        total_results: usize,
        message: Option<String>,
        search_url: String,
        search_parameters: SearchRequest,
    ) -> Self {
        Self {
            status: ReportStatus::Success,
            flights,
            total_results,
            message,
            search_url,
            search_parameters,
        }
    }

    /// Failure report; the total is always 0 because nothing usable was found
    pub fn no_flights_found(
        message: impl Into<String>,
        search_url: String,
        search_parameters: SearchRequest,
    ) -> Self {
        Self {
            status: ReportStatus::NoFlightsFound,
            flights: Vec::new(),
            total_results: 0,
            message: Some(message.into()),
            search_url,
            search_parameters,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_leg_uses_sentinels() {
        let leg = FlightLeg::default();
        assert_eq!(leg.departure_time, "N/A");
        assert!(leg.departure_airport.is_unknown());
        assert_eq!(leg.airlines, vec!["N/A".to_string()]);
        assert_eq!(leg.stops, 0);
        assert!(leg.stop_details.is_empty());
        assert!(!leg.next_day_arrival);
        assert!(!leg.has_schedule());
    }

    #[test]
    fn test_failure_report_serialization() {
        let request = SearchRequest::one_way("YYZ", "HKG", "2025-07-01");
        let report = ScrapeReport::no_flights_found("nothing", "https://x".to_string(), request);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "no_flights_found");
        assert_eq!(json["total_results"], 0);
        assert!(json.get("flights").is_none());
        assert_eq!(json["search_parameters"]["departure_airport"], "YYZ");
    }
}
