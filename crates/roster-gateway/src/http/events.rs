//! Event endpoints.
//!
//! Reads are public. `register` and `cancel` need the gateway bearer token
//! and the caller's account id (see `crate::auth`).
//!
//! Mutation response: `{"error": false}` | `{"error": true, "msg": "..."}`

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use roster_core::registration::{CancellationRequest, RegistrationRequest};
use roster_protocol::events::{PresencePayload, SnapshotPayload};
use roster_store::EventSummary;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::actions::{self, ActionResult};
use crate::app::AppState;
use crate::auth;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: &str) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

fn storage_error(e: roster_store::StoreError) -> ApiError {
    error!(error = %e, "event read failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.user_message())
}

/// GET /events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    state.store.list_events().map(Json).map_err(storage_error)
}

/// GET /events/{id}: full snapshot plus live viewer count.
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SnapshotPayload>, ApiError> {
    let event = state
        .store
        .find_by_id(&id)
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Event not found"))?;
    let subscription_count = state.broadcaster.subscriber_count(event.id.as_str());
    Ok(Json(SnapshotPayload {
        event,
        subscription_count,
    }))
}

/// GET /events/{id}/presence
pub async fn presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PresencePayload>, ApiError> {
    let event = state
        .store
        .find_by_id(&id)
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Event not found"))?;
    Ok(Json(PresencePayload {
        subscription_count: state.broadcaster.subscriber_count(event.id.as_str()),
    }))
}

/// POST /events/{id}/register: `{team, playerName, isKeeper?}`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RegistrationRequest>, JsonRejection>,
) -> (StatusCode, Json<ActionResult>) {
    let Some(account) = auth::authorize(&state.config, &headers) else {
        return unauthorized();
    };
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => return malformed(rejection),
    };
    respond(actions::register(&state, &id, &req, &account).await)
}

/// POST /events/{id}/cancel: `{team, playerName}`
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CancellationRequest>, JsonRejection>,
) -> (StatusCode, Json<ActionResult>) {
    let Some(account) = auth::authorize(&state.config, &headers) else {
        return unauthorized();
    };
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => return malformed(rejection),
    };
    respond(actions::cancel(&state, &id, &req, &account).await)
}

fn unauthorized() -> (StatusCode, Json<ActionResult>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ActionResult::rejected(
            "UNAUTHORIZED",
            "Sign in and set 'Authorization: Bearer <token>' to change the roster",
        )),
    )
}

/// Bodies axum could not decode still get the `{error, msg}` shape.
fn malformed(rejection: JsonRejection) -> (StatusCode, Json<ActionResult>) {
    respond(ActionResult::rejected(
        "VALIDATION_ERROR",
        format!("Invalid request body: {}", rejection.body_text()),
    ))
}

fn respond(result: ActionResult) -> (StatusCode, Json<ActionResult>) {
    (status_for(result.code), Json(result))
}

pub fn status_for(code: Option<&str>) -> StatusCode {
    match code {
        None => StatusCode::OK,
        Some("VALIDATION_ERROR") => StatusCode::UNPROCESSABLE_ENTITY,
        Some("NOT_FOUND") => StatusCode::NOT_FOUND,
        Some("UNAUTHORIZED") => StatusCode::UNAUTHORIZED,
        Some("NOT_OWNER") => StatusCode::FORBIDDEN,
        Some("STORAGE_ERROR") => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::CONFLICT,
    }
}
