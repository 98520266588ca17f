mod auth;
mod bootstrap;
mod health;
pub mod requests;

use std::sync::Arc;

use anyhow::Result;
use caseflow_core::config::{AppConfig, LoadOptions};
use caseflow_db::repositories::{SqlRequestRepository, SqlUserDirectory};

fn init_logging(config: &AppConfig) {
    use caseflow_core::config::LogFormat::*;
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

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let state = requests::RequestsState::new(
        Arc::new(SqlRequestRepository::new(app.db_pool.clone())),
        Arc::new(SqlUserDirectory::new(app.db_pool.clone())),
        Arc::new(requests::TracingAuditSink),
    );

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        request_id = "unknown",
        bind_address = %address,
        "caseflow-server started"
    );

    axum::serve(listener, requests::router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        request_id = "unknown",
        "caseflow-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
