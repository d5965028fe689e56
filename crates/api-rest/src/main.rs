//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server
//! (with OpenAPI/Swagger UI). The workspace's main `uqm-run` binary is the
//! production entry point.

use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use uqm_core::{
    config::{load_journey_catalogue, resolve_journey_file},
    CoreConfig, StoreSet, SystemClock, DEFAULT_CAS_RETRY_LIMIT,
};

/// Main entry point for the UQM REST API server.
///
/// # Environment Variables
/// - `UQM_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `UQM_JOURNEYS_FILE`: Journey catalogue path (default: search for `journeys.yaml`)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the journey catalogue cannot be resolved or fails validation,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("UQM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("-- Starting UQM REST API on {}", addr);

    let journeys_override = std::env::var("UQM_JOURNEYS_FILE").ok().map(PathBuf::from);
    let journeys_file = resolve_journey_file(journeys_override)?;
    let catalogue = load_journey_catalogue(&journeys_file)?;
    let cfg = Arc::new(CoreConfig::new(catalogue, DEFAULT_CAS_RETRY_LIMIT)?);

    let state = AppState::new(cfg, StoreSet::new(), Arc::new(SystemClock));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
