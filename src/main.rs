//! Encounter Engine - authoritative combat server for shared tabletop
//! sessions
//!
//! The engine is the backend server that:
//! - Owns turn/round state for every live encounter
//! - Enforces attack, spell-casting, and action-economy rules
//! - Serves director and player clients over WebSocket
//! - Fans every accepted state change out as an ordered delta stream

mod application;
mod domain;
mod infrastructure;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encounter_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Encounter Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  Lock timeout: {}ms", config.lock_timeout_ms);

    // Initialize application state
    let state = AppState::new(config).await?;
    let state = Arc::new(state);
    tracing::info!("Application state initialized");

    // Sweep worker: drops ended encounters once their subscribers leave.
    let sweep_worker = {
        let engine = state.engine.clone();
        let interval = state.config.sweep_interval_secs;
        tokio::spawn(async move {
            tracing::info!("Starting encounter sweep worker");
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
                let swept = engine.sweep_ended().await;
                if swept > 0 {
                    tracing::debug!("Swept {} ended encounters", swept);
                }
            }
        })
    };

    // Build the router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(infrastructure::websocket::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app).into_future();

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping workers...");
            sweep_worker.abort();
            tracing::info!("Workers stopped");
        }
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
