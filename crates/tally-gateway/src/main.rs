//! Tally Gateway Binary
//!
//! Serves the authorized usage report and meters every other GET and POST.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{Method, StatusCode},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tally_gateway::{
    config::{GatewayConfig, LogFormat},
    AppState, HEALTH_PATH, USAGE_PATH,
};
use tally_metering::{InMemoryStore, JsonFileStore, MeteringService, MetricsStore};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = GatewayConfig::load()?;
    init_tracing(config.log_format);

    info!("Starting Tally Gateway v{}", tally_common::VERSION);

    let store: Arc<dyn MetricsStore> = match &config.metrics_path {
        Some(path) => {
            info!(path = %path.display(), "Persisting metrics to file");
            Arc::new(JsonFileStore::new(path))
        }
        None => {
            warn!("No metrics_path configured, usage metrics are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    let gate = config.authorization_gate();
    if gate.is_empty() {
        warn!("No report keys configured, {} will always return 401", USAGE_PATH);
    } else {
        info!(keys = gate.len(), "Loaded report keys");
    }

    let state = AppState::new(MeteringService::with_store(store, config.recorder()), gate);
    let metering = state.metering.clone();

    // Content handling belongs to the host service; unknown paths are still metered
    let content = Router::new().fallback(not_found);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = tally_gateway::app(state, content)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Tally Gateway listening on {}", addr);
    info!("Endpoints: {}, {}", HEALTH_PATH, USAGE_PATH);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    let metrics = metering.recorder().metrics();
    info!(
        events_recorded = metrics.events_recorded.load(Ordering::Relaxed),
        unique_users_refreshed = metrics.unique_users_refreshed.load(Ordering::Relaxed),
        save_failures = metrics.save_failures.load(Ordering::Relaxed),
        "Shutting down Tally Gateway"
    );
    Ok(())
}
