//! TWSE Scanner - daily bullish-momentum screen for Taiwan equities.
//!
//! Runs one scan → analyze → notify cycle and exits.

use anyhow::{Context, Result};
use twse_common::logging::init_logging_with_exclusions;
use twse_common::Config;
use twse_scanner::ScanService;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load_with_env().context("Failed to load configuration")?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    config.validate().context("Invalid configuration")?;

    tracing::info!("TWSE Scanner v{}", env!("CARGO_PKG_VERSION"));

    let service = ScanService::from_config(&config);
    tracing::info!(pool = service.pool().len(), "Scanner initialized");

    service.run_once().await;
    Ok(())
}
