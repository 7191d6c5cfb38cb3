//! Tool-facing layer: parameter validation and human-readable output
//!
//! Conversational callers send loosely typed parameters. They are checked
//! here, at the boundary, and converted into a [`SearchRequest`]; the
//! resulting [`ScrapeReport`] is rendered back as plain text.

use crate::browser::BrowserDriver;
use crate::client::FlightScraper;
use crate::report::{FlightLeg, ScrapeReport};
use crate::{
    is_airline_code, is_airport_code, is_iso_date, Alliance, CabinClass, ChildType, FlightFilters,
    Passengers, SearchRequest, SortOption, NOT_AVAILABLE,
};
use chrono::{Datelike, Local, NaiveDate};
use rmcp::schemars;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_ADULTS: i64 = 2;
pub const DEFAULT_CARRY_ON_FREE: i64 = 1;
pub const DEFAULT_MAX_PRICE: i64 = 6000;
pub const DEFAULT_END_INDEX: i64 = 15;

/// Parameters of the `scrape_flights` tool
#[derive(Debug, Deserialize, Clone, Default, schemars::JsonSchema)]
pub struct FlightSearchParams {
    #[schemars(description = "3-letter IATA code for the departure airport (e.g., YYZ)")]
    pub departure_airport: String,
    #[schemars(description = "3-letter IATA code for the arrival airport (e.g., HKG)")]
    pub arrival_airport: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub departure_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format; omit for one-way flights")]
    pub return_date: Option<String>,
    #[schemars(description = "Number of adult passengers, age 12+ (default: 2)")]
    pub adults: Option<i64>,
    #[schemars(description = "Number of student passengers (default: 0)")]
    pub students: Option<i64>,
    #[schemars(description = "Child passenger types: '11' (age 2-11), '1S' (toddler with seat), '1L' (infant on lap)")]
    pub children: Option<Vec<String>>,
    #[schemars(description = "Cabin class: economy, premium, business or first (default: economy)")]
    pub plane_type: Option<String>,
    #[schemars(description = "Sort order: bestflight_a, price_a, price_b, duration_a, duration_b, depart_a, depart_b, arrive_a, arrive_b, departReturn_a, departReturn_b, arriveReturn_a, arriveReturn_b (default: price_a)")]
    pub sort_option: Option<String>,
    #[schemars(description = "Minimum number of free carry-on bags (default: 1 when omitted; null for no carry-on filter)")]
    #[serde(default, deserialize_with = "explicit_null")]
    pub carry_on_free: Option<Option<i64>>,
    #[schemars(description = "Minimum number of free checked bags")]
    pub checked_bags_free: Option<i64>,
    #[schemars(description = "Maximum number of stops (0 for direct flights)")]
    pub stops: Option<i64>,
    #[schemars(description = "Maximum price in CAD (default: 6000 when omitted; null for no price limit)")]
    #[serde(default, deserialize_with = "explicit_null")]
    pub max_price: Option<Option<i64>>,
    #[schemars(description = "Airline alliance: VALUE_ALLIANCE, ONE_WORLD, SKY_TEAM or STAR_ALLIANCE")]
    pub alliance: Option<String>,
    #[schemars(description = "2-character IATA airline codes to include (e.g., ['AC', 'UA'])")]
    pub include_airlines: Option<Vec<String>>,
    #[schemars(description = "2-character IATA airline codes to exclude (e.g., ['NK', 'F9'])")]
    pub exclude_airlines: Option<Vec<String>>,
    #[schemars(description = "Only include flights with Wi-Fi (default: false)")]
    pub wifi_only: Option<bool>,
    #[schemars(description = "First result index to return, 0-based inclusive (default: 0)")]
    pub start_index: Option<i64>,
    #[schemars(description = "Last result index to return, inclusive, >= start_index (default: 15)")]
    pub end_index: Option<i64>,
}

/// Keeps an explicit `null` apart from an omitted field: omitted is `None`,
/// `null` is `Some(None)`
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// Check the shape of a date and move it into `current_year` when it lies in
/// an earlier year.
pub fn normalize_date(label: &str, date: &str, current_year: i32) -> Result<String, String> {
    if !is_iso_date(date) {
        return Err(format!("Invalid {} format: Must be YYYY-MM-DD.", label));
    }
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| format!("Invalid {}: Unable to parse date.", label))?;
    if parsed.year() >= current_year {
        return Ok(date.to_string());
    }
    let adjusted = parsed
        .with_year(current_year)
        .ok_or_else(|| format!("Invalid {}: {} does not exist in {}.", label, date, current_year))?;
    let adjusted = adjusted.format("%Y-%m-%d").to_string();
    info!(label, from = date, to = %adjusted, "Adjusted date to the current year");
    Ok(adjusted)
}

fn non_negative(label: &str, value: Option<i64>) -> Result<Option<u32>, String> {
    match value {
        None => Ok(None),
        Some(v) if v < 0 => Err(format!("{} cannot be negative.", label)),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| format!("{} is too large.", label)),
    }
}

fn airline_set(label: &str, codes: Option<Vec<String>>) -> Result<Option<BTreeSet<String>>, String> {
    let Some(codes) = codes else {
        return Ok(None);
    };
    let set: BTreeSet<String> = codes.into_iter().map(|code| code.trim().to_string()).collect();
    if set.iter().any(|code| !is_airline_code(code)) {
        return Err(format!("Invalid {}: All codes must be 2-character IATA codes.", label));
    }
    Ok((!set.is_empty()).then_some(set))
}

fn one_of<T: std::str::FromStr + std::fmt::Display>(
    label: &str,
    value: &str,
    all: &[T],
) -> Result<T, String> {
    value.parse::<T>().map_err(|_| {
        let allowed: Vec<String> = all.iter().map(|v| v.to_string()).collect();
        format!("Invalid {}. Must be one of: {}.", label, allowed.join(", "))
    })
}

/// Validate tool parameters and build the request, applying tool defaults.
/// Errors are user-facing one-line messages.
pub fn to_search_request(params: FlightSearchParams, current_year: i32) -> Result<SearchRequest, String> {
    let departure_date = normalize_date("departure date", &params.departure_date, current_year)?;
    let return_date = params
        .return_date
        .as_deref()
        .filter(|date| !date.is_empty())
        .map(|date| normalize_date("return date", date, current_year))
        .transpose()?;

    if !is_airport_code(&params.departure_airport) {
        return Err("Invalid departure airport code: Must be a 3-letter IATA code.".to_string());
    }
    if !is_airport_code(&params.arrival_airport) {
        return Err("Invalid arrival airport code: Must be a 3-letter IATA code.".to_string());
    }

    let adults = params.adults.unwrap_or(DEFAULT_ADULTS);
    let students = params.students.unwrap_or(0);
    if adults < 0 || students < 0 {
        return Err("Adults and students cannot be negative.".to_string());
    }
    let children = params
        .children
        .unwrap_or_default()
        .iter()
        .map(|code| code.parse::<ChildType>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| "Invalid child type. Must be '11', '1S', or '1L'.".to_string())?;
    let passengers = Passengers {
        adults: u32::try_from(adults).map_err(|_| "Too many adults.".to_string())?,
        students: u32::try_from(students).map_err(|_| "Too many students.".to_string())?,
        children,
    };
    if passengers.total() == 0 {
        return Err("At least one passenger is required.".to_string());
    }

    let cabin_class = one_of(
        "plane_type",
        params.plane_type.as_deref().unwrap_or("economy"),
        &CabinClass::ALL,
    )?;
    let sort_option = one_of(
        "sort_option",
        params.sort_option.as_deref().unwrap_or("price_a"),
        &SortOption::ALL,
    )?;
    let alliance = params
        .alliance
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(|a| one_of("alliance", a, &Alliance::ALL))
        .transpose()?;

    let max_price = non_negative("max_price", params.max_price.unwrap_or(Some(DEFAULT_MAX_PRICE)))?;
    if max_price == Some(0) {
        return Err("max_price must be positive.".to_string());
    }
    let filters = FlightFilters {
        carry_on_free: non_negative("carry_on_free", params.carry_on_free.unwrap_or(Some(DEFAULT_CARRY_ON_FREE)))?,
        checked_bags_free: non_negative("checked_bags_free", params.checked_bags_free)?,
        stops: non_negative("stops", params.stops)?,
        max_price,
        alliance,
        include_airlines: airline_set("include_airlines", params.include_airlines)?,
        exclude_airlines: airline_set("exclude_airlines", params.exclude_airlines)?,
        wifi_only: params.wifi_only.unwrap_or(false),
    };

    let start_index = params.start_index.unwrap_or(0);
    if start_index < 0 {
        return Err("start_index must be a non-negative integer.".to_string());
    }
    let end_index = params.end_index.unwrap_or(DEFAULT_END_INDEX);
    if end_index < start_index {
        return Err("end_index must be an integer greater than or equal to start_index.".to_string());
    }

    Ok(SearchRequest {
        departure_airport: params.departure_airport,
        arrival_airport: params.arrival_airport,
        departure_date,
        return_date,
        passengers,
        cabin_class,
        sort_option,
        filters: Some(filters),
        start_index: start_index as usize,
        end_index: end_index as usize,
    })
}

/// Validate, scrape on a background task and format the outcome
pub async fn run_search<D>(scraper: Arc<FlightScraper<D>>, params: FlightSearchParams) -> String
where
    D: BrowserDriver + 'static,
{
    let request = match to_search_request(params, Local::now().year()) {
        Ok(request) => request,
        Err(message) => {
            info!(message = %message, "Rejected flight search parameters");
            return message;
        }
    };

    let task = tokio::spawn(async move { scraper.scrape(request).await });
    match task.await {
        Ok(Ok(report)) => format_report(&report),
        Ok(Err(e)) => {
            error!("Flight search rejected: {}", e);
            format!("Error fetching flight data: {}", e)
        }
        Err(e) => {
            error!("Scrape task failed: {}", e);
            format!("Error fetching flight data: {}", e)
        }
    }
}

/// Render a report as the text block returned to the caller
pub fn format_report(report: &ScrapeReport) -> String {
    if !report.is_success() {
        let message = report
            .message
            .as_deref()
            .unwrap_or("No flight results found");
        return format!("No flights found: {}\nTotal results: {}", message, report.total_results);
    }
    if report.flights.is_empty() {
        return format!(
            "No flights found: No valid flights found in the requested range\nTotal results: {}",
            report.total_results
        );
    }

    let show_return = report.search_parameters.is_round_trip();
    let blocks: Vec<String> = report
        .flights
        .iter()
        .map(|flight| {
            let fare_types = if flight.fare_types.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                flight.fare_types.join(", ")
            };
            let mut lines = vec![
                "Flight:".to_string(),
                format!("Price: {}", flight.price),
                format!("Fare Types: {}", fare_types),
                format!("Available Booking Sites: {}", flight.available_sites),
                format!(
                    "Baggage: {} carry-on, {} checked",
                    flight.baggage.carry_on, flight.baggage.checked_bags
                ),
            ];
            push_leg(&mut lines, "Outbound:", &flight.outbound_flight);
            if let Some(leg) = flight.return_flight.as_ref().filter(|leg| show_return && leg.has_schedule()) {
                push_leg(&mut lines, "Return:", leg);
            }
            lines.push(format!("Booking Link: {}", flight.booking_link));
            lines.join("\n")
        })
        .collect();

    let mut output = blocks.join("\n---\n");
    if let Some(message) = report.message.as_deref().filter(|m| !m.is_empty()) {
        output.push_str(&format!("\nNote: {}", message));
    }
    output.push_str(&format!("\nTotal results available: {}", report.total_results));
    output
}

fn push_leg(lines: &mut Vec<String>, title: &str, leg: &FlightLeg) {
    lines.push(title.to_string());
    lines.push(format!(
        "  Departure: {} from {} ({})",
        leg.departure_time, leg.departure_airport.code, leg.departure_airport.name
    ));
    lines.push(format!(
        "  Arrival: {} at {} ({})",
        leg.arrival_time, leg.arrival_airport.code, leg.arrival_airport.name
    ));
    lines.push(format!("  Duration: {}", leg.duration));
    lines.push(format!("  Airlines: {}", leg.airlines.join(", ")));
    lines.push(format!("  Stops: {}", leg.stops));
    if leg.stops > 0 {
        for (i, stop) in leg.stop_details.iter().enumerate() {
            lines.push(format!(
                "    Stop {}: {} ({}), Layover: {}",
                i + 1,
                stop.airport_code,
                stop.airport_name,
                stop.layover_duration
            ));
        }
    }
}
