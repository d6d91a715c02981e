mod bootstrap;
mod sweep;

use std::time::Duration;

use anyhow::Result;
use citabot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use citabot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let sweeper = sweep::spawn_idle_sweep(
        app.store.clone(),
        Duration::from_secs(app.config.conversation.idle_timeout_secs),
        Duration::from_secs(app.config.conversation.sweep_interval_secs),
    );

    tracing::info!(
        event_name = "system.server.started",
        catalog_mode = ?app.config.catalog.mode,
        qna_enabled = app.config.qna.enabled,
        "citabot-server started"
    );

    app.pump.start().await?;

    wait_for_shutdown().await?;
    sweeper.abort();
    tracing::info!(event_name = "system.server.stopping", "citabot-server stopping");

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
