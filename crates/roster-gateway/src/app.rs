use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use roster_core::config::RosterConfig;
use roster_core::types::EventId;
use roster_notify::{NotificationComposer, Relay};
use roster_store::RosterStore;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use crate::realtime::Broadcaster;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RosterConfig,
    pub store: RosterStore,
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Shared for sending; taken exclusively only to disconnect.
    pub relay: RwLock<Box<dyn Relay>>,
    pub composer: NotificationComposer,
    /// Per-event mutation locks: held across commit + publish so channel
    /// order matches commit order. Entries live only while someone holds
    /// or waits for them.
    event_locks: DashMap<EventId, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(
        config: RosterConfig,
        store: RosterStore,
        broadcaster: Arc<dyn Broadcaster>,
        relay: Box<dyn Relay>,
    ) -> Self {
        let composer = NotificationComposer::new(config.utc_offset());
        Self {
            config,
            store,
            broadcaster,
            relay: RwLock::new(relay),
            composer,
            event_locks: DashMap::new(),
        }
    }

    /// Serialise mutations of one event. Callers pass the id as stored,
    /// never the raw path segment.
    pub async fn lock_event(&self, event_id: &EventId) -> EventLock<'_> {
        let mutex = self.event_locks.entry(event_id.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        EventLock {
            locks: &self.event_locks,
            event_id: event_id.clone(),
            guard: Some(guard),
        }
    }

    /// Close the outbound relay once the server has stopped.
    pub async fn disconnect_relay(&self) {
        let mut relay = self.relay.write().await;
        let closed = relay.disconnect().await;
        match closed {
            Ok(()) => info!(relay = relay.name(), "relay disconnected"),
            Err(e) => warn!(relay = relay.name(), error = %e, "relay disconnect failed"),
        }
    }

    /// Recipient of group notifications, empty when no relay is configured.
    pub fn group_id(&self) -> &str {
        self.config
            .relay
            .as_ref()
            .map_or("", |r| r.group_id.as_str())
    }
}

/// Held mutation lock of one event. Dropping it releases the lock and
/// forgets the entry once no other task is waiting on it.
pub struct EventLock<'a> {
    locks: &'a DashMap<EventId, Arc<Mutex<()>>>,
    event_id: EventId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EventLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.event_id, |_, m| Arc::strong_count(m) == 1);
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/events", get(crate::http::events::list_events))
        .route("/events/{id}", get(crate::http::events::get_event))
        .route("/events/{id}/presence", get(crate::http::events::presence))
        .route("/events/{id}/register", post(crate::http::events::register))
        .route("/events/{id}/cancel", post(crate::http::events::cancel))
        .route("/events/{id}/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_support::{registration, registration_body, test_state, EVENT_ID, TOKEN};

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>, account: Option<&str>) -> Request<Body> {
        let mut req = Request::post(uri).header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {}", t));
        }
        if let Some(a) = account {
            req = req.header("x-account-id", a);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _) = test_state(7);
        let (status, body) = call(
            build_router(state),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn snapshot_includes_subscription_count() {
        let (state, _) = test_state(7);
        let _rx = state.broadcaster.subscribe(EVENT_ID).unwrap();
        let (status, body) = call(
            build_router(state),
            Request::get(format!("/events/{}", EVENT_ID)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscriptionCount"], 1);
        assert_eq!(body["event"]["extraTeam"], "Suplentes");
    }

    #[tokio::test]
    async fn unknown_event_is_404() {
        let (state, _) = test_state(7);
        let (status, _) = call(
            build_router(state),
            Request::get("/events/0192f0c2a7b87c3e9d1f2a3b4c5d6e70")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_requires_token_and_account() {
        let (state, _) = test_state(7);
        let uri = format!("/events/{}/register", EVENT_ID);
        let router = build_router(state);

        let (status, _) = call(
            router.clone(),
            post_json(&uri, registration_body("Rojo", "Ana", false), None, Some("acc-1")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            router,
            post_json(&uri, registration_body("Rojo", "Ana", false), Some(TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_and_cancel_over_http() {
        let (state, _) = test_state(1);
        let router = build_router(state.clone());
        let register = format!("/events/{}/register", EVENT_ID);

        let (status, body) = call(
            router.clone(),
            post_json(&register, registration_body("Rojo", "Ana", true), Some(TOKEN), Some("acc-1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": false }));

        let (status, body) = call(
            router.clone(),
            post_json(&register, registration_body("Rojo", "Bea", false), Some(TOKEN), Some("acc-2")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], true);
        assert_eq!(body["msg"], "Team Rojo is full");

        let (status, body) = call(
            router.clone(),
            post_json(&register, registration_body("Rojo", "A", false), Some(TOKEN), Some("acc-2")),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["msg"],
            "The player name must be at least two characters long"
        );

        let (status, body) = call(
            router,
            post_json(
                &format!("/events/{}/cancel", EVENT_ID),
                json!({ "team": "Rojo", "playerName": "ana" }),
                Some(TOKEN),
                Some("acc-1"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], false);
        let ev = state.store.find_by_id(EVENT_ID).unwrap().unwrap();
        assert!(ev.teams.get("Rojo").unwrap().players.is_empty());
    }

    #[tokio::test]
    async fn event_locks_are_released_after_each_change() {
        let (state, _) = test_state(7);
        for i in 0..1000 {
            let id = format!("{:032x}", i);
            let res = crate::actions::register(&state, &id, &registration("Rojo", "Ana", false), "acc-1").await;
            assert_eq!(res.code, Some("NOT_FOUND"));
        }
        assert!(state.event_locks.is_empty());

        let padded = format!(" {} ", EVENT_ID);
        let res = crate::actions::register(&state, &padded, &registration("Rojo", "Ana", false), "acc-1").await;
        assert!(!res.error);
        assert!(state.event_locks.is_empty());
    }

    #[tokio::test]
    async fn padded_and_plain_ids_share_one_lock() {
        let (state, _) = test_state(7);
        let plain = state.store.find_by_id(EVENT_ID).unwrap().unwrap().id;
        let padded = state.store.find_by_id(&format!(" {}", EVENT_ID)).unwrap().unwrap().id;
        assert_eq!(plain, padded);

        let held = state.lock_event(&plain).await;
        assert_eq!(state.event_locks.len(), 1);
        let second = state.lock_event(&padded);
        tokio::pin!(second);
        assert!(futures_util::poll!(second.as_mut()).is_pending());

        drop(held);
        let second = second.await;
        assert_eq!(state.event_locks.len(), 1);
        drop(second);
        assert!(state.event_locks.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_gets_action_result_shape() {
        let (state, _) = test_state(7);
        let req = Request::post(format!("/events/{}/register", EVENT_ID))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", TOKEN))
            .header("x-account-id", "acc-1")
            .body(Body::from("{\"team\": "))
            .unwrap();
        let (status, body) = call(build_router(state), req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], true);
        assert!(body["msg"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn cancel_of_someone_elses_player_is_forbidden() {
        let (state, _) = test_state(7);
        let router = build_router(state);
        let (status, _) = call(
            router.clone(),
            post_json(
                &format!("/events/{}/register", EVENT_ID),
                registration_body("Rojo", "Ana", false),
                Some(TOKEN),
                Some("acc-owner"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            router,
            post_json(
                &format!("/events/{}/cancel", EVENT_ID),
                json!({ "team": "Rojo", "playerName": "Ana" }),
                Some(TOKEN),
                Some("acc-stranger"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Only the account that registered Ana can cancel it");
    }

    #[tokio::test]
    async fn relay_is_disconnected_on_shutdown() {
        let (state, relay) = test_state(7);
        assert_eq!(relay.status(), roster_notify::RelayStatus::Connected);

        state.disconnect_relay().await;
        assert_eq!(relay.status(), roster_notify::RelayStatus::Disconnected);

        let (_, body) = call(
            build_router(state),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["relay_status"], "disconnected");
    }

    #[tokio::test]
    async fn presence_endpoint_counts_viewers() {
        let (state, _) = test_state(7);
        let _a = state.broadcaster.subscribe(EVENT_ID).unwrap();
        let _b = state.broadcaster.subscribe(EVENT_ID).unwrap();
        let (status, body) = call(
            build_router(state),
            Request::get(format!("/events/{}/presence", EVENT_ID))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "subscriptionCount": 2 }));
    }
}
