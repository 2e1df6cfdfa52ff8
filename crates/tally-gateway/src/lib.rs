//! # Tally Gateway
//!
//! HTTP surface for Tally:
//! - `GET /usage`: authorized usage report
//! - `GET /health`: liveness
//! - a metering layer wrapped around the host service's content routes
//!
//! ```text
//!  client ──► record_usage layer ──► content routes (host service)
//!                  │
//!                  └──► UsageRecorder
//!
//!  client ──► /usage ──► AuthorizationGate ──► ReportGenerator
//! ```

pub mod config;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{routing::get, Router};
use tally_common::AuthorizationGate;
use tally_metering::MeteringService;

/// Path of the usage report endpoint
pub const USAGE_PATH: &str = "/usage";

/// Path of the health endpoint
pub const HEALTH_PATH: &str = "/health";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub metering: Arc<MeteringService>,
    pub gate: Arc<AuthorizationGate>,
}

impl AppState {
    pub fn new(metering: MeteringService, gate: AuthorizationGate) -> Self {
        Self {
            metering: Arc::new(metering),
            gate: Arc::new(gate),
        }
    }
}

/// Build the application router
///
/// Every GET and POST served by `content` is metered; the report and health
/// endpoints are not.
pub fn app(state: AppState, content: Router<AppState>) -> Router {
    let metered = content.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::record_usage,
    ));

    Router::new()
        .route(HEALTH_PATH, get(routes::health_check))
        .route(USAGE_PATH, get(routes::usage_report))
        .merge(metered)
        .with_state(state)
}
