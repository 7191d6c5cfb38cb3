//! Search URL generation for the Kayak results page
//!
//! The URL carries the whole search: airports, dates, passengers and cabin in
//! the path, sort order and filters in the query string.

use crate::{FlightError, FlightFilters, Passengers, SearchRequest};
use std::collections::BTreeMap;

/// Base of every results page URL
pub const BASE_SEARCH_URL: &str = "https://www.ca.kayak.com/flights";

/// Build the search URL against the default Kayak base
pub fn search_url(request: &SearchRequest) -> Result<String, FlightError> {
    build_search_url(BASE_SEARCH_URL, request)
}

/// Build `<base>/<DEP>-<ARR>/<date>[/<return>]/<passengers>/<cabin>?sort=<sort>[&fs=<filters>]`
///
/// The request is validated first, so a malformed request never yields a URL.
pub fn build_search_url(base: &str, request: &SearchRequest) -> Result<String, FlightError> {
    request.validate()?;

    let mut path_parts = vec![
        format!("{}-{}", request.departure_airport, request.arrival_airport),
        request.departure_date.clone(),
    ];
    if let Some(return_date) = &request.return_date {
        path_parts.push(return_date.clone());
    }
    path_parts.push(passenger_segment(&request.passengers));
    path_parts.push(request.cabin_class.as_str().to_string());

    let mut query_parts = vec![format!("sort={}", request.sort_option.as_str())];
    if let Some(filters) = request.filters.as_ref().map(filter_segment) {
        if !filters.is_empty() {
            query_parts.push(format!("fs={}", filters));
        }
    }

    Ok(format!(
        "{}/{}?{}",
        base.trim_end_matches('/'),
        path_parts.join("/"),
        query_parts.join("&")
    ))
}

/// Passenger path segment, e.g. `2adults-1students-children-11-21L`
pub fn passenger_segment(passengers: &Passengers) -> String {
    let mut parts = Vec::new();
    if passengers.adults > 0 {
        parts.push(format!("{}adults", passengers.adults));
    }
    if passengers.students > 0 {
        parts.push(format!("{}students", passengers.students));
    }
    if !passengers.children.is_empty() {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for child in &passengers.children {
            *counts.entry(child.as_str()).or_insert(0) += 1;
        }
        // BTreeMap iterates in lexicographic code order
        let children = counts
            .into_iter()
            .map(|(code, count)| {
                if count > 1 {
                    format!("{}{}", count, code)
                } else {
                    code.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("-");
        parts.push(format!("children-{}", children));
    }
    parts.join("-")
}

/// Filter query segment; empty when no filter is set
pub fn filter_segment(filters: &FlightFilters) -> String {
    let mut parts = Vec::new();
    if let Some(carry_on) = filters.carry_on_free {
        parts.push(format!("cfc={}", carry_on));
    }
    if let Some(checked) = filters.checked_bags_free {
        parts.push(format!("bfc={}", checked));
    }
    if let Some(stops) = filters.stops {
        parts.push(format!("stops={}", stops));
    }
    if let Some(max_price) = filters.max_price {
        parts.push(format!("price=-{}", max_price));
    }
    if let Some(alliance) = filters.alliance {
        parts.push(format!("alliance={}", alliance.as_str()));
    }
    // Both airline tokens are written when both sets are given; callers decide
    // whether that combination makes sense.
    if let Some(include) = filters.include_airlines.as_ref().filter(|set| !set.is_empty()) {
        parts.push(format!("airlines={}", join_codes(include)));
    }
    if let Some(exclude) = filters.exclude_airlines.as_ref().filter(|set| !set.is_empty()) {
        parts.push(format!("airlines=-{}", join_codes(exclude)));
    }
    if filters.wifi_only {
        parts.push("wifi=wifi".to_string());
    }
    parts.join(";")
}

fn join_codes<'a>(codes: impl IntoIterator<Item = &'a String>) -> String {
    codes
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alliance, CabinClass, ChildType, SortOption};

    fn scenario_request() -> SearchRequest {
        SearchRequest {
            passengers: Passengers::adults(2),
            cabin_class: CabinClass::Economy,
            sort_option: SortOption::Cheapest,
            filters: Some(FlightFilters {
                max_price: Some(6000),
                ..Default::default()
            }),
            ..SearchRequest::round_trip("YYZ", "HKG", "2025-07-01", "2025-07-25")
        }
    }

    #[test]
    fn test_round_trip_url() {
        let url = search_url(&scenario_request()).unwrap();
        assert_eq!(
            url,
            "https://www.ca.kayak.com/flights/YYZ-HKG/2025-07-01/2025-07-25/2adults/economy?sort=price_a&fs=price=-6000"
        );
    }

    #[test]
    fn test_one_way_url_without_filters() {
        let request = SearchRequest::one_way("LAX", "JFK", "2025-08-15");
        let url = build_search_url("https://example.test/flights/", &request).unwrap();
        assert_eq!(
            url,
            "https://example.test/flights/LAX-JFK/2025-08-15/1adults/economy?sort=bestflight_a"
        );
    }

    #[test]
    fn test_url_is_deterministic() {
        let mut request = scenario_request();
        request.filters = Some(FlightFilters {
            include_airlines: Some(["UA".to_string(), "AC".to_string(), "LH".to_string()].into()),
            ..Default::default()
        });
        let first = search_url(&request).unwrap();
        let second = search_url(&request.clone()).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("fs=airlines=AC,LH,UA"));
    }

    #[test]
    fn test_children_sorted_by_code() {
        let passengers = Passengers {
            adults: 2,
            students: 0,
            children: vec![ChildType::InfantLap, ChildType::Child],
        };
        assert_eq!(passenger_segment(&passengers), "2adults-children-11-1L");
    }

    #[test]
    fn test_repeated_children_are_counted() {
        let passengers = Passengers {
            adults: 0,
            students: 1,
            children: vec![
                ChildType::ToddlerSeat,
                ChildType::Child,
                ChildType::ToddlerSeat,
                ChildType::InfantLap,
                ChildType::Child,
                ChildType::Child,
            ],
        };
        assert_eq!(passenger_segment(&passengers), "1students-children-311-1L-21S");
    }

    #[test]
    fn test_empty_filters_omit_fs_parameter() {
        assert_eq!(filter_segment(&FlightFilters::default()), "");

        let mut request = scenario_request();
        request.filters = Some(FlightFilters::default());
        let url = search_url(&request).unwrap();
        assert!(!url.contains("fs="));
        assert!(url.ends_with("?sort=price_a"));
    }

    #[test]
    fn test_filter_token_order() {
        let filters = FlightFilters {
            carry_on_free: Some(1),
            checked_bags_free: Some(2),
            stops: Some(0),
            max_price: Some(900),
            alliance: Some(Alliance::StarAlliance),
            include_airlines: Some(["AC".to_string()].into()),
            exclude_airlines: Some(["NK".to_string(), "F9".to_string()].into()),
            wifi_only: true,
        };
        assert_eq!(
            filter_segment(&filters),
            "cfc=1;bfc=2;stops=0;price=-900;alliance=STAR_ALLIANCE;airlines=AC;airlines=-F9,NK;wifi=wifi"
        );
    }

    #[test]
    fn test_invalid_requests_are_rejected() {
        let mut request = scenario_request();
        request.departure_airport = "YY".to_string();
        assert!(matches!(search_url(&request), Err(FlightError::Validation(_))));

        let mut request = scenario_request();
        request.filters = Some(FlightFilters {
            include_airlines: Some(["ACX".to_string()].into()),
            ..Default::default()
        });
        assert!(matches!(search_url(&request), Err(FlightError::Validation(_))));

        let mut request = scenario_request();
        request.start_index = 5;
        request.end_index = 1;
        assert!(matches!(search_url(&request), Err(FlightError::Validation(_))));
    }
}
