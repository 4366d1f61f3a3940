use axum::{
    extract::{ws::Message, ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use roster_core::config::MAX_PAYLOAD_BYTES;
use roster_protocol::events::SnapshotPayload;
use roster_protocol::frames::EventFrame;
use roster_protocol::methods::TICK;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth;
use crate::ws::{dispatch, send};

/// Browsers cannot set headers on a WS upgrade, so credentials for
/// roster methods ride in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
    pub account: Option<String>,
}

/// Per-connection context.
pub struct WsSession {
    pub conn_id: String,
    pub event_id: String,
    /// Set when the connection may call roster methods.
    pub account: Option<String>,
}

/// Axum handler: upgrades HTTP to WebSocket at GET /events/{id}/ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let event = match state.store.find_by_id(&id) {
        Ok(Some(event)) => event,
        Ok(None) => return (StatusCode::NOT_FOUND, "Event not found").into_response(),
        Err(e) => {
            warn!(error = %e, "event lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let account = if auth::check_token(&state.config, params.token.as_deref()) {
        params
            .account
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
    } else {
        None
    };
    let session = WsSession {
        conn_id: uuid::Uuid::new_v4().to_string(),
        event_id: event.id.to_string(),
        account,
    };

    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(move |socket| run_connection(socket, state, session))
}

/// Per-connection event loop: lives for the entire WS session.
///
/// The channel is joined before the snapshot is read, so no committed
/// change can fall between them; changes already in the snapshot arrive
/// again and are dropped by the viewer's version check.
async fn run_connection(socket: WebSocket, state: Arc<AppState>, session: WsSession) {
    let conn_id = session.conn_id.as_str();
    let channel = session.event_id.as_str();
    info!(conn_id, event_id = channel, can_write = session.account.is_some(), "viewer connected");

    let (mut tx, mut rx) = socket.split();
    let mut channel_rx = match state.broadcaster.subscribe(channel) {
        Ok(rx) => Some(rx),
        Err(e) => {
            // Still serve the snapshot; live updates are unavailable.
            warn!(conn_id, error = %e, "channel join failed");
            None
        }
    };

    if send_snapshot(&mut tx, &state, channel).await.is_err() {
        if let Some(rx) = channel_rx {
            state.broadcaster.unsubscribe(channel, rx);
        }
        return;
    }

    let mut tick = tokio::time::interval(std::time::Duration::from_secs(
        state.config.realtime.heartbeat_secs.max(1),
    ));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tick.tick().await;

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id, size = text.len(), "payload too large");
                            break;
                        }
                        if let Some(res) = dispatch::handle(text.as_str(), &session, &state).await {
                            if send::json(&mut tx, &res).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // axum answers pings itself
                    _ => {}
                }
            }

            event = recv_or_pending(&mut channel_rx) => {
                match event {
                    Ok(payload) => {
                        if send::text(&mut tx, payload).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(conn_id, missed, "viewer lagged, resending snapshot");
                        if send_snapshot(&mut tx, &state, channel).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = tick.tick() => {
                let ev = EventFrame::new(
                    TICK,
                    serde_json::json!({ "ts": chrono::Utc::now().timestamp_millis() }),
                );
                if send::json(&mut tx, &ev).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(rx) = channel_rx {
        state.broadcaster.unsubscribe(channel, rx);
    }
    info!(conn_id, "viewer disconnected");
}

async fn recv_or_pending(
    rx: &mut Option<tokio::sync::broadcast::Receiver<String>>,
) -> Result<String, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_snapshot(
    tx: &mut send::WsSink,
    state: &AppState,
    channel: &str,
) -> Result<(), axum::Error> {
    let event = match state.store.find_by_id(channel) {
        Ok(Some(event)) => event,
        Ok(None) => return Err(axum::Error::new("event disappeared")),
        Err(e) => {
            warn!(error = %e, "snapshot read failed");
            return Err(axum::Error::new(e));
        }
    };
    let snapshot = SnapshotPayload {
        event,
        subscription_count: state.broadcaster.subscriber_count(channel),
    };
    send::json(tx, &snapshot.to_frame()).await
}
