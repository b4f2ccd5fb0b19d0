//! # Ledger Relay
//!
//! Standalone relay server for one shared ledger database.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`LEDGER_BUS_CONFIG` file if set, then
//!    `LEDGER_BUS_*` overrides)
//! 2. Initialize logging and metrics
//! 3. Bind on base port + 1
//! 4. Run until Ctrl+C or a relayed shutdown request

use anyhow::{bail, Context, Result};
use ledger_bus::BusConfig;
use ledger_telemetry::{init_telemetry, TelemetryConfig};
use relay_runtime::RelayRuntime;
use tracing::{error, info};

/// Path of the TOML configuration file.
const CONFIG_ENV: &str = "LEDGER_BUS_CONFIG";

fn load_config() -> Result<BusConfig> {
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => BusConfig::load(&path).with_context(|| format!("Failed to load {path}"))?,
        Err(_) => BusConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid LEDGER_BUS_* environment override")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_service("ledger-relay"))?;

    let config = load_config()?;
    if !config.store_type.supports_remote() {
        bail!("Store type {} cannot be shared over the message bus", config.store_type);
    }

    let runtime = RelayRuntime::start(&config).await?;
    info!("Relay is running. Press Ctrl+C to stop.");

    runtime
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
