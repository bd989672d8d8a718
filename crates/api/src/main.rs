//! Soil Telemetry Logger - Main Entry Point

use api::{init_logging, run, run_once, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config.log).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!("=== Soil Telemetry v{} ===", env!("CARGO_PKG_VERSION"));

    // Cron-style single cycle
    if std::env::args().skip(1).any(|arg| arg == "--once") {
        if !run_once(&config).await? {
            error!("Sensor reading cycle did not store a reading");
            return Err("sensor reading failed".into());
        }
        info!("Sensor reading cycle completed successfully");
        return Ok(());
    }

    run(config).await
}
