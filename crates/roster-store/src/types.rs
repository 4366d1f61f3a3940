use chrono::{DateTime, Utc};
use roster_core::types::{Address, Event, EventId, EventStatus, Player};
use serde::{Deserialize, Serialize};

/// Definition of a new event, as read from a seed file or the admin CLI.
///
/// Wire:
/// ```json
/// { "date": "2026-11-07T01:00:00Z", "description": "Friday match",
///   "address": { "text": "Cancha 5", "url": "https://..." },
///   "teams": ["Rojo", "Azul", "Suplentes"], "extraTeam": "Suplentes" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Preset id; a fresh UUIDv7 is issued when absent.
    #[serde(default)]
    pub id: Option<EventId>,
    pub date: DateTime<Utc>,
    pub description: String,
    pub address: Address,
    /// Team names in display order. Must include `extra_team`.
    pub teams: Vec<String>,
    pub extra_team: String,
    /// Falls back to the store default.
    #[serde(default)]
    pub team_limit: Option<usize>,
}

/// Row of the event listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: EventId,
    pub date: DateTime<Utc>,
    pub description: String,
    pub status: EventStatus,
    pub players: usize,
    pub version: u64,
}

/// Outcome of an unregister call.
#[derive(Debug, Clone)]
pub struct Unregistered {
    /// Event state after the call.
    pub event: Event,
    /// The removed record, or `None` when nobody matched (no-op).
    pub removed: Option<Player>,
}

/// Outcome of a successful register call.
#[derive(Debug, Clone)]
pub struct Registered {
    /// Event state right after the commit.
    pub event: Event,
    /// The stored record (trimmed name, keeper flag as persisted).
    pub player: Player,
}
