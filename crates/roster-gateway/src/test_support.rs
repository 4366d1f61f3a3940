//! Fixtures for gateway tests: an in-memory store seeded with one event,
//! and relay/broadcaster doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::TimeZone;
use roster_core::config::RosterConfig;
use roster_core::registration::{CancellationRequest, RegistrationRequest};
use roster_core::types::{Address, EventId};
use roster_notify::{MessageId, OutboundMessage, Relay, RelayError, RelayStatus};
use roster_protocol::frames::EventFrame;
use roster_store::{NewEvent, RosterStore};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::app::AppState;
use crate::realtime::{BroadcastError, Broadcaster, ChannelHub};

pub const EVENT_ID: &str = "0192f0c2a7b87c3e9d1f2a3b4c5d6e7f";
pub const TOKEN: &str = "test-token";

pub fn test_state(team_limit: usize) -> (Arc<AppState>, RecordingRelay) {
    let relay = RecordingRelay::default();
    let state = test_state_with(
        team_limit,
        Arc::new(ChannelHub::new(256)),
        Box::new(relay.clone()),
    );
    (state, relay)
}

pub fn test_state_with(
    team_limit: usize,
    broadcaster: Arc<dyn Broadcaster>,
    relay: Box<dyn Relay>,
) -> Arc<AppState> {
    let mut config = RosterConfig::default();
    config.gateway.auth.token = Some(TOKEN.to_string());

    let store = RosterStore::in_memory().expect("in-memory store");
    store
        .create_event(NewEvent {
            id: Some(EventId::from(EVENT_ID)),
            date: chrono::Utc.with_ymd_and_hms(2026, 11, 7, 1, 0, 0).unwrap(),
            description: "Friday match".to_string(),
            address: Address {
                text: "Cancha 5".to_string(),
                url: "https://maps.example/c5".to_string(),
            },
            teams: vec!["Rojo".into(), "Azul".into(), "Suplentes".into()],
            extra_team: "Suplentes".to_string(),
            team_limit: Some(team_limit),
        })
        .expect("seed event");

    Arc::new(AppState::new(config, store, broadcaster, relay))
}

pub fn registration(team: &str, name: &str, keeper: bool) -> RegistrationRequest {
    RegistrationRequest {
        team: team.to_string(),
        player_name: name.to_string(),
        is_keeper: Some(keeper),
    }
}

pub fn registration_body(team: &str, name: &str, keeper: bool) -> Value {
    json!({ "team": team, "playerName": name, "isKeeper": keeper })
}

pub fn cancellation(team: &str, name: &str) -> CancellationRequest {
    CancellationRequest {
        team: team.to_string(),
        player_name: name.to_string(),
    }
}

/// Keeps every message it is asked to send. Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingRelay {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingRelay {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Relay for RecordingRelay {
    fn name(&self) -> &str {
        "recording"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RelayError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, RelayError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(msg.content.clone());
        Ok(MessageId(format!("m-{}", sent.len())))
    }

    fn status(&self) -> RelayStatus {
        if self.closed.load(Ordering::SeqCst) {
            RelayStatus::Disconnected
        } else {
            RelayStatus::Connected
        }
    }
}

pub struct FailingRelay;

#[async_trait]
impl Relay for FailingRelay {
    fn name(&self) -> &str {
        "failing"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn send(&self, _msg: &OutboundMessage) -> Result<MessageId, RelayError> {
        Err(RelayError::Unavailable("provider down".to_string()))
    }

    fn status(&self) -> RelayStatus {
        RelayStatus::Error("provider down".to_string())
    }
}

pub struct FailingBroadcaster;

#[async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn publish(&self, _channel: &str, _frame: &EventFrame) -> Result<usize, BroadcastError> {
        Err(BroadcastError::Unavailable("hub down".to_string()))
    }

    fn subscribe(&self, _channel: &str) -> Result<broadcast::Receiver<String>, BroadcastError> {
        Err(BroadcastError::Unavailable("hub down".to_string()))
    }

    fn unsubscribe(&self, _channel: &str, _rx: broadcast::Receiver<String>) {}

    fn subscriber_count(&self, _channel: &str) -> usize {
        0
    }

    fn channel_count(&self) -> usize {
        0
    }
}
