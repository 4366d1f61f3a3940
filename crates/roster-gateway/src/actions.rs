//! Register and cancel flows shared by the HTTP and WS surfaces.
//!
//! validate -> resolve event -> lock event -> commit -> publish -> unlock
//! -> compose -> relay.
//! Only validation and store failures reach the caller. A failed publish
//! marks the result degraded; relay failures are logged and dropped.

use std::time::Duration;

use roster_core::registration::{CancellationRequest, RegistrationRequest};
use roster_core::types::{Event, EventId};
use roster_notify::OutboundMessage;
use roster_protocol::events::RosterEvent;
use roster_store::StoreError;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::app::AppState;

/// Wire: `{ "error": false }` | `{ "error": true, "msg": "..." }`,
/// plus `"degraded": true` when the change committed but could not be
/// broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    /// Machine-readable error code, used for status mapping.
    #[serde(skip)]
    pub code: Option<&'static str>,
}

impl ActionResult {
    pub fn ok(degraded: bool) -> Self {
        Self {
            error: false,
            msg: None,
            degraded,
            code: None,
        }
    }

    pub fn rejected(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            error: true,
            msg: Some(msg.into()),
            degraded: false,
            code: Some(code),
        }
    }

    fn from_store(err: StoreError) -> Self {
        if err.is_rejection() {
            info!(code = err.code(), reason = %err, "roster change rejected");
        } else {
            error!(error = %err, "roster change failed");
        }
        Self::rejected(err.code(), err.user_message())
    }
}

#[instrument(skip(state, req), fields(team = %req.team))]
pub async fn register(
    state: &AppState,
    event_id: &str,
    req: &RegistrationRequest,
    account: &str,
) -> ActionResult {
    let reg = match req.validate() {
        Ok(r) => r,
        Err(e) => return ActionResult::rejected(e.code(), e.to_string()),
    };

    let event_id = match resolve(state, event_id) {
        Ok(id) => id,
        Err(rejected) => return rejected,
    };
    let (event, degraded) = {
        let _lock = state.lock_event(&event_id).await;
        let registered = match state.store.register(event_id.as_str(), &reg, account) {
            Ok(r) => r,
            Err(e) => return ActionResult::from_store(e),
        };
        let change =
            RosterEvent::registered(reg.team, registered.player, registered.event.version);
        let degraded = !publish(state, &registered.event, &change).await;
        (registered.event, degraded)
    };

    notify(state, &event).await;
    ActionResult::ok(degraded)
}

/// Cancelling a player who is not in the team succeeds without publishing
/// or notifying anything.
#[instrument(skip(state, req), fields(team = %req.team))]
pub async fn cancel(
    state: &AppState,
    event_id: &str,
    req: &CancellationRequest,
    account: &str,
) -> ActionResult {
    let cancellation = match req.validate() {
        Ok(c) => c,
        Err(e) => return ActionResult::rejected(e.code(), e.to_string()),
    };

    let event_id = match resolve(state, event_id) {
        Ok(id) => id,
        Err(rejected) => return rejected,
    };
    let (event, degraded) = {
        let _lock = state.lock_event(&event_id).await;
        let out = match state.store.unregister(
            event_id.as_str(),
            &cancellation.team,
            &cancellation.player_name,
            account,
        ) {
            Ok(out) => out,
            Err(e) => return ActionResult::from_store(e),
        };
        let Some(player) = out.removed else {
            info!(account, "nothing to cancel");
            return ActionResult::ok(false);
        };
        info!(account, player = %player.name, "registration cancelled");
        let change =
            RosterEvent::removed(cancellation.team, player.to_ref(), out.event.version);
        let degraded = !publish(state, &out.event, &change).await;
        (out.event, degraded)
    };

    notify(state, &event).await;
    ActionResult::ok(degraded)
}

/// Stored id of the event, so every spelling of it shares one lock.
fn resolve(state: &AppState, raw_id: &str) -> Result<EventId, ActionResult> {
    match state.store.find_by_id(raw_id) {
        Ok(Some(event)) => Ok(event.id),
        Ok(None) => Err(ActionResult::from_store(StoreError::NotFound {
            id: raw_id.to_string(),
        })),
        Err(e) => Err(ActionResult::from_store(e)),
    }
}

/// Returns false when the change could not be broadcast.
async fn publish(state: &AppState, event: &Event, change: &RosterEvent) -> bool {
    match state
        .broadcaster
        .publish(event.id.as_str(), &change.to_frame())
        .await
    {
        Ok(reached) => {
            info!(
                event_id = %event.id,
                kind = change.name(),
                version = change.version(),
                reached,
                "change broadcast"
            );
            true
        }
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "broadcast failed, viewers will be stale");
            false
        }
    }
}

/// Post the roster summary to the group. Never fails the request.
async fn notify(state: &AppState, event: &Event) {
    let content = match state.composer.compose(event) {
        Ok(c) => c,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "notification not composed");
            return;
        }
    };
    let msg = OutboundMessage {
        recipient_id: state.group_id().to_string(),
        content,
    };

    let timeout_ms = state
        .config
        .relay
        .as_ref()
        .map_or(roster_core::config::RELAY_TIMEOUT_MS, |r| r.timeout_ms);
    let relay = state.relay.read().await;
    let name = relay.name();
    match tokio::time::timeout(Duration::from_millis(timeout_ms), relay.send(&msg)).await {
        Ok(Ok(id)) => info!(relay = name, msg_id = %id.0, "group notified"),
        Ok(Err(e)) => warn!(relay = name, error = %e, "group notification failed, roster unaffected"),
        Err(_) => warn!(relay = name, timeout_ms, "group notification timed out, roster unaffected"),
    }
}
