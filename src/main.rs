use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use uqm_core::{
    config::{load_journey_catalogue, resolve_journey_file},
    CoreConfig, StoreSet, SystemClock, DEFAULT_CAS_RETRY_LIMIT,
};

/// Main entry point for the UQM application
///
/// Starts the REST server with the Swagger UI mounted at `/swagger-ui`.
/// All queue state lives in the in-process record store; the journey
/// catalogue is loaded once at startup and is immutable thereafter.
///
/// # Environment Variables
/// - `UQM_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `UQM_JOURNEYS_FILE`: Journey catalogue path (default: search for `journeys.yaml`)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("uqm=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("UQM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting UQM REST on {}", rest_addr);

    let journeys_override = std::env::var("UQM_JOURNEYS_FILE").ok().map(PathBuf::from);
    let journeys_file = resolve_journey_file(journeys_override)?;
    let catalogue = load_journey_catalogue(&journeys_file)?;
    tracing::info!(
        "++ Loaded {} journey template(s) from {}",
        catalogue.templates.len(),
        journeys_file.display()
    );

    let cfg = Arc::new(CoreConfig::new(catalogue, DEFAULT_CAS_RETRY_LIMIT)?);
    let state = AppState::new(cfg, StoreSet::new(), Arc::new(SystemClock));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
