mod bootstrap;
mod responder;

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use witty_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use witty_core::config::LogFormat::*;

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
    let config = AppConfig::load(LoadOptions::from_env())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    info!(
        event_name = "system.server.slack_transport_mode",
        transport_mode = app.transport_mode,
        correlation_id = "bootstrap",
        "slack transport mode selected"
    );

    let signal_shutdown = app.shutdown.clone();
    tokio::spawn(async move {
        if let Err(error) = wait_for_shutdown().await {
            warn!(error = %error, "failed to listen for shutdown signal");
        }
        signal_shutdown.cancel();
    });

    info!(event_name = "system.server.started", correlation_id = "bootstrap", "witty started");
    app.runner.start(app.shutdown.clone()).await?;
    if !app.shutdown.is_cancelled() {
        warn!(
            event_name = "system.server.ingestion_stopped",
            correlation_id = "shutdown",
            "slack ingestion ended without a shutdown signal; waiting for termination"
        );
        app.shutdown.cancelled().await;
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        in_flight = app.tasks.len(),
        "witty stopping"
    );
    app.tasks.close();
    let grace = Duration::from_secs(app.config.runtime.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.tasks.wait()).await.is_err() {
        warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            abandoned = app.tasks.len(),
            grace_secs = grace.as_secs(),
            "in-flight message tasks did not finish before the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
