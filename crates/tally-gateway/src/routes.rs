//! HTTP handlers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tally_common::{AuthError, ReportOutcome, TallyError};
use tracing::error;

use crate::{middleware::credential, AppState};

/// Handler error mapped to an HTTP response
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(AuthError),
    Internal(TallyError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err)
    }
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
            ApiError::Internal(e) => {
                error!(error = %e, "Usage report failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": tally_common::VERSION,
    }))
}

/// `GET /usage`
pub async fn usage_report(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.gate.check(credential(&headers, &state.gate))?;

    let response = match state.metering.generate().await? {
        ReportOutcome::Report(report) => Json(report).into_response(),
        ReportOutcome::NotFound => Json(serde_json::json!({ "error": "not-found" })).into_response(),
    };
    Ok(response)
}
