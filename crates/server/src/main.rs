mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use outreach_core::config::{AppConfig, LoadOptions, LogFormat};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "outreach-server listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let router = app.router();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            finished??;
            tracing::error!(
                event_name = "system.server.exited",
                correlation_id = "runtime",
                "server stopped without a shutdown signal"
            );
            app.store.close().await;
            return Ok(());
        }
        signal = wait_for_shutdown() => signal?,
    }

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "draining in-flight requests"
    );
    let _ = stop_tx.send(true);

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish within the grace period"
        ),
    }
    app.store.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
