// src/mcp_server.rs

use anyhow::Result;
use kayak_flights::tool::{run_search, FlightSearchParams};
use kayak_flights::{ChromiumDriver, FlightScraper, ScrapeConfig};
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_appender;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flight scraping MCP server
#[derive(Clone)]
pub struct FlightServer {
    scraper: Arc<FlightScraper<ChromiumDriver>>,
}

impl FlightServer {
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        let driver = ChromiumDriver::new(config.headless);
        let scraper = FlightScraper::new(driver, config)?;
        Ok(Self {
            scraper: Arc::new(scraper),
        })
    }

    /// Initialize logging to file; stdout carries the MCP protocol
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "kayak-flights-mcp.log");

        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("info").add_directive("kayak_flights=debug".parse()?),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/kayak-flights-mcp.log.*");
        Ok(())
    }
}

#[tool(tool_box)]
impl FlightServer {
    /// Scrape Kayak flight offers with pagination support
    #[tool(description = "Scrape flight offers from Kayak with pagination support. If the user only gives a departure date the trip is one-way; with a return date it is a round trip. Unspecified options use their defaults. Returns one block per flight separated by '---' with price, fare types, baggage, outbound/return legs with stops, and a booking link, followed by the total number of results available.")]
    async fn scrape_flights(&self, #[tool(aggr)] params: FlightSearchParams) -> String {
        info!(
            departure_airport = %params.departure_airport,
            arrival_airport = %params.arrival_airport,
            departure_date = %params.departure_date,
            return_date = params.return_date.as_deref(),
            start_index = params.start_index.unwrap_or(0),
            end_index = params.end_index.unwrap_or(15),
            "Flight scrape request received"
        );

        run_search(Arc::clone(&self.scraper), params).await
    }
}

#[tool(tool_box)]
impl ServerHandler for FlightServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A Kayak flight scraping server. Use scrape_flights with IATA airport codes and YYYY-MM-DD dates; page through results with start_index/end_index.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = FlightServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without logging rather than failing
    }

    info!("Starting MCP Flight Server");

    let config = ScrapeConfig::from_env();
    debug!(?config, "Loaded scraper configuration");
    let server = FlightServer::new(config)?;
    let transport = stdio();

    info!("MCP server initialized, starting service");

    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
