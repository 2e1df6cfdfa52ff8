//! Request metering middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tally_common::{AuthorizationGate, HttpVerb};
use tracing::warn;

use crate::AppState;

/// Recorded when a request carries no usable `User-Agent`
pub const UNKNOWN_USER_AGENT: &str = "unknown";

/// Credential from the `Authorization` header
///
/// The raw header value is used when it is a configured key. Otherwise a
/// leading `Bearer ` is stripped. A header that is present but not valid
/// UTF-8 yields an empty credential, which the gate rejects as invalid rather
/// than missing.
pub fn credential<'h>(headers: &'h HeaderMap, gate: &AuthorizationGate) -> Option<&'h str> {
    let value = headers.get(header::AUTHORIZATION)?;
    let raw = value.to_str().unwrap_or_default().trim();
    if gate.identify(raw).is_some() {
        return Some(raw);
    }
    Some(raw.strip_prefix("Bearer ").map(str::trim).unwrap_or(raw))
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(UNKNOWN_USER_AGENT)
        .to_string()
}

/// Record one usage event per served GET or POST
///
/// The caller is attributed as a unique user only when it presents a valid
/// report key. Recording failures are logged and never change the response.
pub async fn record_usage(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let verb = HttpVerb::from_method(request.method().as_str());
    let agent = user_agent(request.headers());
    let user_id = credential(request.headers(), &state.gate)
        .and_then(|key| state.gate.identify(key))
        .filter(|label| !label.is_empty())
        .map(str::to_owned);

    let response = next.run(request).await;

    if let Some(verb) = verb {
        if let Err(e) = state.metering.record(verb, &agent, user_id.as_deref()).await {
            warn!(%verb, user_agent = %agent, error = %e, "Failed to record usage");
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn gate(keys: &[(&str, &str)]) -> AuthorizationGate {
        keys.iter()
            .map(|(k, l)| (k.to_string(), l.to_string()))
            .collect()
    }

    #[test]
    fn test_credential_strips_bearer() {
        let gate = gate(&[("abc123", "ops")]);
        let mut headers = HeaderMap::new();
        assert_eq!(credential(&headers, &gate), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(credential(&headers, &gate), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(credential(&headers, &gate), Some("abc123"));
    }

    #[test]
    fn test_key_with_bearer_prefix_matches_raw() {
        let gate = gate(&[("Bearer abc123", "legacy")]);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));

        let key = credential(&headers, &gate);
        assert_eq!(key, Some("Bearer abc123"));
        assert_eq!(gate.check(key), Ok("legacy"));
    }

    #[test]
    fn test_non_utf8_credential_is_empty() {
        let gate = gate(&[]);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_bytes(b"\xffkey").unwrap());
        assert_eq!(credential(&headers, &gate), Some(""));
    }

    #[test]
    fn test_user_agent_defaults_to_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_agent(&headers), UNKNOWN_USER_AGENT);

        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/7.0"));
        assert_eq!(user_agent(&headers), "curl/7.0");
    }
}
