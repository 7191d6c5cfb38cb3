//! Basic flight scrape example

use kayak_flights::{
    scrape_flights, CabinClass, FlightFilters, Passengers, SearchRequest, SortOption,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("kayak_flights=info").init();

    let request = SearchRequest {
        departure_airport: "YYZ".to_string(),
        arrival_airport: "HKG".to_string(),
        departure_date: "2025-07-01".to_string(),
        return_date: Some("2025-07-25".to_string()),
        passengers: Passengers::adults(2),
        cabin_class: CabinClass::Economy,
        sort_option: SortOption::Cheapest,
        filters: Some(FlightFilters {
            carry_on_free: Some(1),
            max_price: Some(6000),
            ..FlightFilters::default()
        }),
        start_index: 0,
        end_index: 15,
    };

    println!("Searching for flights from YYZ to HKG...");
    let report = scrape_flights(request).await?;

    println!("Search URL: {}", report.search_url);
    println!("Status: {:?}", report.status);
    println!("Total results available: {}", report.total_results);
    if let Some(message) = &report.message {
        println!("Note: {}", message);
    }

    for (i, flight) in report.flights.iter().take(3).enumerate() {
        let leg = &flight.outbound_flight;
        println!("\n--- Flight {} ---", i + 1);
        println!("Price: {}", flight.price);
        println!(
            "Outbound: {} {} -> {} {} ({})",
            leg.departure_airport.code,
            leg.departure_time,
            leg.arrival_airport.code,
            leg.arrival_time,
            leg.duration
        );
        println!("Airlines: {}", leg.airlines.join(", "));
        println!("Stops: {}", leg.stops);
        println!("Book: {}", flight.booking_link);
    }

    Ok(())
}
