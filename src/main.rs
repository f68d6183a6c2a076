// src/main.rs

use nila_cognito::prelude::*;
use nila_cognito::routes;
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting nila-cognito backend");

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    info!(
        user_pool_id = config.user_pool_id.as_deref().unwrap_or("-"),
        region = config.region.as_deref().unwrap_or("-"),
        app_client_id = config.app_client_id.as_deref().unwrap_or("-"),
        "Cognito configuration loaded"
    );
    if let Err(e) = config.validate() {
        error!(error = %e, "Cognito configuration is incomplete; protected routes will reject every request");
    }

    let validator = Validator::new(config);
    let app = routes::app(validator);

    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
