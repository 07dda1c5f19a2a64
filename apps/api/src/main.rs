mod analysis;
mod config;
mod engine_client;
mod errors;
mod models;
mod routes;
mod staging;
mod state;
mod upload;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::engine_client::EngineClient;
use crate::routes::build_router;
use crate::staging::StagingStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Analyzer API v{}", env!("CARGO_PKG_VERSION"));

    // Staging directory must exist before the first upload lands
    let staging = StagingStore::new(config.upload_dir.clone(), config.staging_timeout);
    let swept = staging.ensure_dir().await?;
    info!(
        "Staging uploads in {} (max {} bytes, {} orphans swept)",
        staging.dir().display(),
        config.max_upload_bytes,
        swept
    );

    // Initialize analysis engine client
    let engine = EngineClient::new(
        config.engine_url.clone(),
        config.engine_timeout,
        config.engine_pdf_only,
    )?;
    info!(
        "Analysis engine client initialized (url: {}, timeout: {:?}, pdf only: {})",
        engine.base_url(),
        config.engine_timeout,
        config.engine_pdf_only
    );

    let cors = build_cors(&config)?;

    // Build app state
    let state = AppState::new(config.clone(), Arc::new(engine));

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_cors(config: &Config) -> Result<CorsLayer> {
    let Some(origin) = &config.cors_allow_origin else {
        warn!("CORS_ALLOW_ORIGIN not set; allowing all origins");
        return Ok(CorsLayer::permissive());
    };

    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("CORS_ALLOW_ORIGIN is not a valid origin: '{origin}'"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

/// Resolves on Ctrl+C or SIGTERM. In-flight analyses finish before exit.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }

    info!("Shutting down gracefully...");
}
