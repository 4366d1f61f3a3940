//! Request authorisation for roster mutations.
//!
//! The bearer token gates the gateway itself; the account id names who is
//! registering. Account identity is issued by the external session
//! provider and forwarded in `x-account-id`.

use axum::http::HeaderMap;
use roster_core::config::{AuthMode, RosterConfig};

pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Returns true if `token` satisfies the configured auth mode.
pub fn check_token(config: &RosterConfig, token: Option<&str>) -> bool {
    match config.gateway.auth.mode {
        AuthMode::None => true,
        AuthMode::Token => match (&config.gateway.auth.token, token) {
            (Some(expected), Some(given)) => expected == given,
            // Token mode without a configured token denies everything.
            _ => false,
        },
    }
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub fn account_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Account id of an authorised request, or `None` when it must be refused.
pub fn authorize(config: &RosterConfig, headers: &HeaderMap) -> Option<String> {
    if !check_token(config, extract_bearer(headers)) {
        return None;
    }
    account_id(headers)
}
