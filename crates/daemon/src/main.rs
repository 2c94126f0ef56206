//! FieldOps dispatch daemon
//!
//! Serves contractor recommendations and the assignment lifecycle over
//! JSON-RPC, backed by SQLite.

mod app;
mod settings;

use anyhow::Result;
use app::Daemon;
use settings::Settings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FORMAT_VAR: &str = "FIELDOPS_LOG_FORMAT";
const DEFAULT_LOG_FILTER: &str = "fieldops=info";

fn init_logging() {
    let log_format = std::env::var(LOG_FORMAT_VAR).unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("FieldOps dispatch daemon v{} starting", fieldops_core::VERSION);

    let settings = Settings::load()?;
    let daemon = Daemon::start(&settings).await?;

    info!(addr = %daemon.rpc_addr, "Ready. Press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    daemon.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
