//! CLI interface for kayak-flights

use clap::{Parser, Subcommand};
use kayak_flights::tool::format_report;
use kayak_flights::{
    Alliance, CabinClass, ChildType, ChromiumDriver, FlightFilters, FlightScraper, Passengers,
    ScrapeConfig, SearchRequest, SortOption,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kayak-flights")]
#[command(about = "Scrape Kayak flight offers with a headless browser")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Origin airport code (e.g. YYZ)
        #[arg(short, long)]
        from: String,
        /// Destination airport code (e.g. HKG)
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of adults
        #[arg(long, default_value = "1")]
        adults: u32,
        /// Number of students
        #[arg(long, default_value = "0")]
        students: u32,
        /// Child passenger type, repeatable (11, 1S, 1L)
        #[arg(long = "child")]
        children: Vec<String>,
        /// Cabin class (economy, premium, business, first)
        #[arg(long, default_value = "economy")]
        cabin: String,
        /// Sort option (e.g. price_a, bestflight_a, duration_a)
        #[arg(long, default_value = "bestflight_a")]
        sort: String,
        /// Minimum free carry-on bags
        #[arg(long)]
        carry_on: Option<u32>,
        /// Minimum free checked bags
        #[arg(long)]
        checked_bags: Option<u32>,
        /// Maximum number of stops
        #[arg(long)]
        max_stops: Option<u32>,
        /// Maximum price
        #[arg(long)]
        max_price: Option<u32>,
        /// Airline alliance (VALUE_ALLIANCE, ONE_WORLD, SKY_TEAM, STAR_ALLIANCE)
        #[arg(long)]
        alliance: Option<String>,
        /// Airlines to include (comma-separated)
        #[arg(long)]
        airlines: Option<String>,
        /// Airlines to exclude (comma-separated)
        #[arg(long)]
        exclude_airlines: Option<String>,
        /// Only flights with Wi-Fi
        #[arg(long)]
        wifi: bool,
        /// First result index (0-based, inclusive)
        #[arg(long, default_value = "0")]
        start: usize,
        /// Last result index (inclusive)
        #[arg(long, default_value = "15")]
        end: usize,
        /// Print the JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Output file for the JSON report
        #[arg(short, long)]
        output: Option<String>,
        /// Directory for screenshots and report snapshots
        #[arg(long)]
        diagnostics_dir: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
}

fn parse_codes(codes: Option<String>) -> Option<std::collections::BTreeSet<String>> {
    codes.map(|a| {
        a.split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            from,
            to,
            date,
            return_date,
            adults,
            students,
            children,
            cabin,
            sort,
            carry_on,
            checked_bags,
            max_stops,
            max_price,
            alliance,
            airlines,
            exclude_airlines,
            wifi,
            start,
            end,
            json,
            output,
            diagnostics_dir,
            headed,
        } => {
            let children = children
                .iter()
                .map(|c| c.parse::<ChildType>())
                .collect::<Result<Vec<_>, _>>()?;
            let filters = FlightFilters {
                carry_on_free: carry_on,
                checked_bags_free: checked_bags,
                stops: max_stops,
                max_price,
                alliance: alliance.as_deref().map(str::parse::<Alliance>).transpose()?,
                include_airlines: parse_codes(airlines),
                exclude_airlines: parse_codes(exclude_airlines),
                wifi_only: wifi,
            };

            let request = SearchRequest {
                departure_airport: from.to_uppercase(),
                arrival_airport: to.to_uppercase(),
                departure_date: date,
                return_date,
                passengers: Passengers {
                    adults,
                    students,
                    children,
                },
                cabin_class: cabin.parse::<CabinClass>()?,
                sort_option: sort.parse::<SortOption>()?,
                filters: Some(filters),
                start_index: start,
                end_index: end,
            };

            let mut config = ScrapeConfig::from_env();
            if diagnostics_dir.is_some() {
                config.diagnostics_dir = diagnostics_dir;
            }
            if headed {
                config.headless = false;
            }

            let scraper = FlightScraper::new(ChromiumDriver::new(config.headless), config)?;

            eprintln!("Searching for flights...");
            let report = scraper.scrape(request).await?;

            let rendered = serde_json::to_string_pretty(&report)?;
            if let Some(output_file) = output {
                fs::write(&output_file, &rendered)?;
                eprintln!("Results saved to {}", output_file);
            }

            if json {
                println!("{}", rendered);
            } else {
                println!("{}", format_report(&report));
            }

            if !report.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "kayak-flights",
            "search",
            "--from", "YYZ",
            "--to", "HKG",
            "--date", "2025-07-01",
            "--child", "11",
            "--child", "1L",
            "--max-price", "6000",
        ]);

        assert!(cli.is_ok());

        if let Ok(Cli { command: Commands::Search { from, to, date, children, max_price, end, .. } }) = cli {
            assert_eq!(from, "YYZ");
            assert_eq!(to, "HKG");
            assert_eq!(date, "2025-07-01");
            assert_eq!(children, vec!["11", "1L"]);
            assert_eq!(max_price, Some(6000));
            assert_eq!(end, 15);
        }
    }

    #[test]
    fn test_parse_codes() {
        let codes = parse_codes(Some("ua, ac,,LH".to_string())).unwrap();
        assert_eq!(codes.into_iter().collect::<Vec<_>>(), vec!["AC", "LH", "UA"]);
        assert!(parse_codes(None).is_none());
    }
}
