//! AppleBites Server - Business valuation service.
//!
//! Computes EBITDA-based valuation ranges from assessment submissions,
//! persists them, and exports contacts to the downstream CRM.

use anyhow::Result;
use applebites_common::config::Config;
use applebites_common::logging::init_logging;
use applebites_server::ValuationService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("AppleBites Server v{}", env!("CARGO_PKG_VERSION"));

    // Start the valuation service
    let service = ValuationService::new(config)?;

    // Log startup timing before entering the serve loop
    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
