//! HTML parser for Kayak results pages
//!
//! Every field has a documented fallback: the markup belongs to a third party
//! and changes without notice, so a missing element degrades to a sentinel
//! instead of failing the card.

use crate::report::{AirportRef, Baggage, FlightLeg, FlightMetadata, FlightResult, StopDetail};
use crate::{is_airport_code, FlightError, NOT_AVAILABLE};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Origin that relative booking links are resolved against
pub const BASE_URL: &str = "https://www.ca.kayak.com";

/// Selector of one result card on the results page
pub const RESULT_CARD_SELECTOR: &str = ".Fxw9-result-item-container";

/// Selector of the pagination control
pub const SHOW_MORE_SELECTOR: &str = "div.ULvh-button.show-more-button";

static LAYOVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+h \d+m) layover").expect("layover pattern is valid"));

const NO_RESULTS_PHRASES: [&str; 2] = ["no flights found", "no results"];

/// Cards extracted from one page snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    /// Number of result cards materialized on the page
    pub total_results: usize,
    /// Parsed cards inside the requested window, in page order
    pub flights: Vec<crate::FlightResult>,
    /// Cards inside the window that were advertisements
    pub skipped: usize,
}

/// HTML parser for Kayak result cards
pub struct FlightResponseParser {
    origin: String,

    result_card_selector: Selector,     // .Fxw9-result-item-container
    leg_list_selector: Selector,        // .hJSA-list
    ad_badge_selector: Selector,        // .c_3eP-badge-content, .NAnQ-ad-badge
    price_selector: Selector,           // .e2GB-price-text
    fare_types_selector: Selector,      // .DOum-name
    sites_selector: Selector,           // .M_JD-num-sites-label
    booking_link_selector: Selector,    // .nrc6-price-section .M_JD-booking-btn a[role='link']
    carry_on_selector: Selector,        // .ac27-fee-box[aria-label*='carry-on bag'] .ac27-inner:last-child
    checked_bag_selector: Selector,     // .ac27-fee-box[aria-label*='checked bag'] .ac27-inner:last-child
    booking_text_selector: Selector,    // .dOAU-booking-text
    div_selector: Selector,

    times_selector: Selector,           // .VY2U .vmXl span
    airports_block_selector: Selector,  // .EFvI
    airport_info_selector: Selector,    // .jLhY-airport-info
    span_selector: Selector,
    duration_selector: Selector,        // .xdW8 .vmXl
    carrier_img_selector: Selector,     // .c5iUd-leg-carrier img
    stops_text_selector: Selector,      // .JWEO-stops-text
    stop_marker_selector: Selector,     // .JWEO .c_cgF-mod-variant-full-airport > span
    layover_selector: Selector,         // .hEI8
    layover_airport_selector: Selector, // .AFFP
    next_day_selector: Selector,        // .VY2U-adendum

    no_results_class_selector: Selector, // div[class*='no-results']
}

fn selector(css: &str, label: &str) -> Result<Selector, FlightError> {
    Selector::parse(css)
        .map_err(|e| FlightError::ParseError(format!("Invalid {} selector: {}", label, e)))
}

/// Visible text of an element with whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_count(text: &str) -> Option<u32> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

impl FlightResponseParser {
    pub fn new() -> Result<Self, FlightError> {
        Self::with_origin(BASE_URL)
    }

    pub fn with_origin(origin: &str) -> Result<Self, FlightError> {
        debug!(origin, "Initializing HTML parser with selectors");
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),

            result_card_selector: selector(RESULT_CARD_SELECTOR, "result card")?,
            leg_list_selector: selector(".hJSA-list", "leg list")?,
            ad_badge_selector: selector(".c_3eP-badge-content, .NAnQ-ad-badge", "ad badge")?,
            price_selector: selector(".e2GB-price-text", "price")?,
            fare_types_selector: selector(".DOum-name", "fare types")?,
            sites_selector: selector(".M_JD-num-sites-label", "available sites")?,
            booking_link_selector: selector(
                ".nrc6-price-section .M_JD-booking-btn a[role='link']",
                "booking link",
            )?,
            carry_on_selector: selector(
                ".ac27-fee-box[aria-label*='carry-on bag'] .ac27-inner:last-child",
                "carry-on",
            )?,
            checked_bag_selector: selector(
                ".ac27-fee-box[aria-label*='checked bag'] .ac27-inner:last-child",
                "checked bag",
            )?,
            booking_text_selector: selector(".dOAU-booking-text", "booking text")?,
            div_selector: selector("div", "div")?,

            times_selector: selector(".VY2U .vmXl span", "times")?,
            airports_block_selector: selector(".EFvI", "airports block")?,
            airport_info_selector: selector(".jLhY-airport-info", "airport info")?,
            span_selector: selector("span", "span")?,
            duration_selector: selector(".xdW8 .vmXl", "duration")?,
            carrier_img_selector: selector(".c5iUd-leg-carrier img", "carrier")?,
            stops_text_selector: selector(".JWEO-stops-text", "stops text")?,
            stop_marker_selector: selector(
                ".JWEO .c_cgF-mod-variant-full-airport > span",
                "stop marker",
            )?,
            layover_selector: selector(".hEI8", "layover")?,
            layover_airport_selector: selector(".AFFP", "layover airport")?,
            next_day_selector: selector(".VY2U-adendum", "next day")?,

            no_results_class_selector: selector("div[class*='no-results']", "no results")?,
        })
    }

    /// True when the page shows an explicit "no results" indicator.
    ///
    /// Text matches count for any `div` whose descendant text carries a
    /// phrase, unless that div holds result cards.
    pub fn has_no_results(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        if document.select(&self.no_results_class_selector).next().is_some() {
            return true;
        }
        document.select(&self.div_selector).any(|div| {
            if self.result_card_selector.matches(&div)
                || div.select(&self.result_card_selector).next().is_some()
            {
                return false;
            }
            let text = element_text(div).to_lowercase();
            NO_RESULTS_PHRASES.iter().any(|phrase| text.contains(phrase))
        })
    }

    /// Parse every card with index in `[start_index, end_index]`
    pub fn extract_window(&self, html: &str, start_index: usize, end_index: usize) -> PageExtraction {
        let document = Html::parse_document(html);
        let cards: Vec<_> = document.select(&self.result_card_selector).collect();
        let total_results = cards.len();

        let mut flights = Vec::new();
        let mut skipped = 0;
        for (idx, card) in cards.into_iter().enumerate() {
            if idx < start_index || idx > end_index {
                continue;
            }
            debug!(index = idx, "Processing result card");
            match self.parse_card(card) {
                Some(flight) => flights.push(flight),
                None => skipped += 1,
            }
        }

        debug!(
            total_results,
            extracted = flights.len(),
            skipped,
            "Result window extracted"
        );
        PageExtraction {
            total_results,
            flights,
            skipped,
        }
    }

    /// True when a card is sponsored content rather than a flight offer
    pub fn is_advertisement(&self, card: ElementRef<'_>) -> bool {
        card.select(&self.leg_list_selector).next().is_none()
            || card.select(&self.ad_badge_selector).next().is_some()
    }

    /// Map one result card; `None` means the card is an ad and is skipped
    pub fn parse_card(&self, card: ElementRef<'_>) -> Option<FlightResult> {
        if self.is_advertisement(card) {
            info!("Skipping advertisement block");
            return None;
        }

        let price = self
            .first_text(card, &self.price_selector)
            .map(|price| clean_price(&price))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let fare_types = self
            .first_text(card, &self.fare_types_selector)
            .map(|text| {
                text.split(',')
                    .map(|fare| fare.trim().to_string())
                    .filter(|fare| !fare.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let available_sites = self
            .first_text(card, &self.sites_selector)
            .and_then(|text| text.split_whitespace().next().and_then(parse_count))
            .unwrap_or(0);

        let baggage = Baggage {
            carry_on: self
                .first_text(card, &self.carry_on_selector)
                .and_then(|text| parse_count(&text))
                .unwrap_or(0),
            checked_bags: self
                .first_text(card, &self.checked_bag_selector)
                .and_then(|text| parse_count(&text))
                .unwrap_or(0),
        };

        let booking_link = card
            .select(&self.booking_link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(|href| self.resolve_link(href))
            .unwrap_or_else(|| self.origin.clone());

        let (outbound, inbound) = self.leg_elements(card);
        let outbound_flight = self.parse_leg(outbound);
        let return_flight = inbound.map(|leg| self.parse_leg(Some(leg)));

        let metadata = FlightMetadata {
            multiple_airlines: self.mentions_multiple_airlines(card),
            booking_button_text: self
                .first_text(card, &self.booking_text_selector)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        };

        Some(FlightResult {
            price,
            fare_types,
            available_sites,
            baggage,
            booking_link,
            outbound_flight,
            return_flight,
            metadata,
        })
    }

    /// Parse one leg; a missing leg yields the all-sentinel [`FlightLeg`]
    pub fn parse_leg(&self, leg: Option<ElementRef<'_>>) -> FlightLeg {
        let Some(leg) = leg else {
            warn!("No leg element found");
            return FlightLeg::default();
        };

        // Times are positional: departure, separator, arrival
        let times: Vec<String> = leg.select(&self.times_selector).map(element_text).collect();
        let departure_time = times
            .first()
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let arrival_time = times
            .get(2)
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let (departure_airport, arrival_airport) = self.parse_airports(leg);

        let duration = self
            .first_text(leg, &self.duration_selector)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let mut airlines: Vec<String> = leg
            .select(&self.carrier_img_selector)
            .filter_map(|img| img.value().attr("alt"))
            .map(|alt| alt.trim().to_string())
            .filter(|alt| !alt.is_empty())
            .collect();
        if airlines.is_empty() {
            airlines.push(NOT_AVAILABLE.to_string());
        }

        let stops = self.parse_stops(leg);
        let stop_details = if stops > 0 {
            let details = self.parse_stop_details(leg, &departure_airport, &arrival_airport);
            if details.len() != stops as usize {
                warn!(
                    expected = stops,
                    found = details.len(),
                    "Stop count does not match stop details"
                );
            }
            details
        } else {
            Vec::new()
        };

        let next_day_arrival = leg.select(&self.next_day_selector).next().is_some();

        FlightLeg {
            departure_time,
            departure_airport,
            arrival_time,
            arrival_airport,
            duration,
            airlines,
            stops,
            stop_details,
            next_day_arrival,
        }
    }

    fn leg_elements<'a>(&self, card: ElementRef<'a>) -> (Option<ElementRef<'a>>, Option<ElementRef<'a>>) {
        let Some(list) = card.select(&self.leg_list_selector).next() else {
            return (None, None);
        };
        let mut legs = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li");
        (legs.next(), legs.next())
    }

    fn parse_airports(&self, leg: ElementRef<'_>) -> (AirportRef, AirportRef) {
        let Some(block) = leg.select(&self.airports_block_selector).next() else {
            warn!("No airports block found in leg");
            return (AirportRef::unknown(), AirportRef::unknown());
        };

        let infos: Vec<_> = block.select(&self.airport_info_selector).collect();
        if infos.len() != 2 {
            warn!(
                found = infos.len(),
                text = %element_text(block),
                "Expected 2 airport info elements"
            );
            return (AirportRef::unknown(), AirportRef::unknown());
        }

        let departure = self.parse_airport(infos[0]);
        let arrival = self.parse_airport(infos[1]);
        if departure.code == arrival.code {
            warn!(code = %departure.code, "Same departure and arrival airport detected");
        }
        (departure, arrival)
    }

    fn parse_airport(&self, info: ElementRef<'_>) -> AirportRef {
        let spans: Vec<String> = info.select(&self.span_selector).map(element_text).collect();
        AirportRef::new(
            spans.first().cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            spans.get(1).cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        )
    }

    fn parse_stops(&self, leg: ElementRef<'_>) -> u32 {
        let Some(text) = self.first_text(leg, &self.stops_text_selector) else {
            warn!("Stops text not found, assuming direct");
            return 0;
        };
        if let Some(count) = text.split_whitespace().next().and_then(parse_count) {
            return count;
        }
        match text.to_lowercase().as_str() {
            "direct" | "nonstop" | "non-stop" => 0,
            other => {
                warn!(text = other, "Unrecognized stops text");
                0
            }
        }
    }

    fn parse_stop_details(
        &self,
        leg: ElementRef<'_>,
        departure: &AirportRef,
        arrival: &AirportRef,
    ) -> Vec<StopDetail> {
        let mut seen = HashSet::new();
        let mut details = Vec::new();

        for marker in leg.select(&self.stop_marker_selector) {
            let Some(code_elem) = marker.select(&self.span_selector).next() else {
                warn!(text = %element_text(marker), "No code element found in stop");
                continue;
            };
            let code: String = element_text(code_elem).chars().take(3).collect();
            if !is_airport_code(&code) {
                warn!(code = %code, "Invalid airport code in stop");
                continue;
            }
            if code == departure.code || code == arrival.code {
                debug!(code = %code, "Skipping stop matching departure or arrival");
                continue;
            }
            if !seen.insert(code.clone()) {
                continue;
            }

            let layover = marker.select(&self.layover_selector).next();
            let airport_name = layover
                .and_then(|layover| self.first_text(layover, &self.layover_airport_selector))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            let layover_duration = layover
                .map(element_text)
                .and_then(|text| {
                    LAYOVER_RE
                        .captures(&text)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string())
                })
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            details.push(StopDetail {
                airport_code: code,
                airport_name,
                layover_duration,
            });
        }

        details
    }

    fn mentions_multiple_airlines(&self, card: ElementRef<'_>) -> bool {
        if !element_text(card).contains("Multiple Airlines") {
            return false;
        }
        card.select(&self.div_selector)
            .any(|div| element_text(div).contains("Multiple Airlines"))
    }

    fn resolve_link(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.origin, href)
        } else {
            format!("{}/{}", self.origin, href)
        }
    }

    /// Non-empty text of the first match under `scope`
    fn first_text(&self, scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
        scope
            .select(selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }
}

/// Replace non-breaking spaces the page puts between currency and amount
pub fn clean_price(price: &str) -> String {
    let cleaned = price.replace('\u{a0}', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEG_WITH_STOPS: &str = r#"
        <ol><li class="leg">
          <div class="VY2U"><div class="vmXl"><span>9:05 am</span><span>–</span><span>11:40 pm</span></div>
            <span class="VY2U-adendum">+1</span></div>
          <div class="EFvI">
            <div class="jLhY-airport-info"><span>YYZ</span><span>Toronto Pearson</span></div>
            <div class="jLhY-airport-info"><span>HKG</span><span>Hong Kong Intl</span></div>
          </div>
          <div class="xdW8"><div class="vmXl">25h 35m</div></div>
          <div class="c5iUd-leg-carrier"><img alt="Air Canada"><img alt="Cathay Pacific"></div>
          <div class="JWEO">
            <span class="JWEO-stops-text">2 stops</span>
            <div class="c_cgF-mod-variant-full-airport">
              <span><span>YVR</span><span class="hEI8"><span class="AFFP">Vancouver Intl</span> 2h 5m layover</span></span>
              <span><span>YVR</span><span class="hEI8"><span class="AFFP">Vancouver again</span> 9h 9m layover</span></span>
              <span><span>HKG</span><span class="hEI8"><span class="AFFP">Hong Kong</span></span></span>
              <span><span>TPE</span><span class="hEI8"><span class="AFFP">Taipei</span> layover soon</span></span>
            </div>
          </div>
        </li></ol>
    "#;

    fn with_leg<F: FnOnce(&FlightResponseParser, ElementRef<'_>)>(html: &str, f: F) {
        let parser = FlightResponseParser::new().unwrap();
        let fragment = Html::parse_fragment(html);
        let li = Selector::parse("li").unwrap();
        let leg = fragment.select(&li).next().expect("fixture has a leg");
        f(&parser, leg);
    }

    #[test]
    fn test_flight_response_parser_creation() {
        assert!(FlightResponseParser::new().is_ok());
    }

    #[test]
    fn test_missing_leg_yields_sentinels() {
        let parser = FlightResponseParser::new().unwrap();
        assert_eq!(parser.parse_leg(None), FlightLeg::default());
    }

    #[test]
    fn test_empty_leg_yields_sentinels() {
        with_leg("<ol><li></li></ol>", |parser, leg| {
            assert_eq!(parser.parse_leg(Some(leg)), FlightLeg::default());
        });
    }

    #[test]
    fn test_parse_leg_with_stops() {
        with_leg(LEG_WITH_STOPS, |parser, leg| {
            let leg = parser.parse_leg(Some(leg));
            assert_eq!(leg.departure_time, "9:05 am");
            assert_eq!(leg.arrival_time, "11:40 pm");
            assert_eq!(leg.departure_airport, AirportRef::new("YYZ", "Toronto Pearson"));
            assert_eq!(leg.arrival_airport, AirportRef::new("HKG", "Hong Kong Intl"));
            assert_eq!(leg.duration, "25h 35m");
            assert_eq!(leg.airlines, vec!["Air Canada", "Cathay Pacific"]);
            assert_eq!(leg.stops, 2);
            assert!(leg.next_day_arrival);

            // duplicate YVR collapses to the first occurrence, HKG is the arrival
            assert_eq!(
                leg.stop_details,
                vec![
                    StopDetail {
                        airport_code: "YVR".to_string(),
                        airport_name: "Vancouver Intl".to_string(),
                        layover_duration: "2h 5m".to_string(),
                    },
                    StopDetail {
                        airport_code: "TPE".to_string(),
                        airport_name: "Taipei".to_string(),
                        layover_duration: "N/A".to_string(),
                    },
                ]
            );
        });
    }

    #[test]
    fn test_airports_degrade_when_block_count_is_wrong() {
        let html = r#"<ol><li>
            <div class="EFvI"><div class="jLhY-airport-info"><span>YYZ</span><span>Toronto</span></div></div>
            <div class="JWEO"><span class="JWEO-stops-text">Direct</span></div>
        </li></ol>"#;
        with_leg(html, |parser, leg| {
            let leg = parser.parse_leg(Some(leg));
            assert!(leg.departure_airport.is_unknown());
            assert!(leg.arrival_airport.is_unknown());
            assert_eq!(leg.stops, 0);
            assert!(leg.stop_details.is_empty());
        });
    }

    #[test]
    fn test_unrecognized_stops_text_defaults_to_zero() {
        let html = r#"<ol><li><span class="JWEO-stops-text">several</span></li></ol>"#;
        with_leg(html, |parser, leg| {
            assert_eq!(parser.parse_leg(Some(leg)).stops, 0);
        });
    }

    #[test]
    fn test_clean_price() {
        assert_eq!(clean_price("C$\u{a0}1,234"), "C$ 1,234");
        assert_eq!(clean_price("  "), "N/A");
    }

    #[test]
    fn test_booking_link_resolution() {
        let parser = FlightResponseParser::with_origin("https://www.ca.kayak.com/").unwrap();
        assert_eq!(parser.resolve_link("/book/abc"), "https://www.ca.kayak.com/book/abc");
        assert_eq!(parser.resolve_link("book/abc"), "https://www.ca.kayak.com/book/abc");
        assert_eq!(parser.resolve_link("https://partner.test/x"), "https://partner.test/x");
    }

    #[test]
    fn test_no_results_detection() {
        let parser = FlightResponseParser::new().unwrap();
        assert!(parser.has_no_results(r#"<div class="aa-no-results-panel">x</div>"#));
        assert!(parser.has_no_results("<div><p>x</p>No flights found for these dates</div>"));
        assert!(!parser.has_no_results(r#"<div class="Fxw9-result-item-container"></div>"#));
    }

    #[test]
    fn test_no_results_phrase_in_nested_element() {
        let parser = FlightResponseParser::new().unwrap();
        assert!(parser.has_no_results(r#"<div class="x"><h2>No flights found</h2></div>"#));
        assert!(parser.has_no_results("<div><span>No results</span></div>"));
        assert!(parser.has_no_results(
            "<div><section><p>Sorry, <b>no results</b> match your filters</p></section></div>"
        ));
    }

    #[test]
    fn test_no_results_phrase_around_cards_is_ignored() {
        let parser = FlightResponseParser::new().unwrap();
        let html = r#"<div class="resultsList">
            <div class="Fxw9-result-item-container"><span>Filter tip: no results hidden</span></div>
        </div>"#;
        assert!(!parser.has_no_results(html));
    }

    #[test]
    fn test_parse_empty_response() {
        let parser = FlightResponseParser::new().unwrap();
        let extraction = parser.extract_window("<html></html>", 0, 15);
        assert_eq!(extraction, PageExtraction::default());
    }
}
