use roster_core::types::{Event, Player, PlayerRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frames::EventFrame;
use crate::methods::{INSCRIPTION, PRESENCE, REMOVAL, SNAPSHOT};

/// Payload of an `inscription` broadcast.
/// Wire: `{ "team": "Rojo", "player": {...}, "version": 3 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inscription {
    pub team: String,
    pub player: Player,
    pub version: u64,
}

/// Payload of a `removal` broadcast.
/// Wire: `{ "team": "Rojo", "player": { "name": "Ana", "registerBy": "..." }, "version": 4 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub team: String,
    pub player: PlayerRef,
    pub version: u64,
}

/// A committed roster change, fanned out on the event's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    Registered(Inscription),
    Removed(Removal),
}

impl RosterEvent {
    pub fn registered(team: impl Into<String>, player: Player, version: u64) -> Self {
        RosterEvent::Registered(Inscription {
            team: team.into(),
            player,
            version,
        })
    }

    pub fn removed(team: impl Into<String>, player: PlayerRef, version: u64) -> Self {
        RosterEvent::Removed(Removal {
            team: team.into(),
            player,
            version,
        })
    }

    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            RosterEvent::Registered(_) => INSCRIPTION,
            RosterEvent::Removed(_) => REMOVAL,
        }
    }

    /// Event version right after this change was committed.
    pub fn version(&self) -> u64 {
        match self {
            RosterEvent::Registered(i) => i.version,
            RosterEvent::Removed(r) => r.version,
        }
    }

    pub fn team(&self) -> &str {
        match self {
            RosterEvent::Registered(i) => &i.team,
            RosterEvent::Removed(r) => &r.team,
        }
    }

    pub fn to_frame(&self) -> EventFrame {
        let frame = match self {
            RosterEvent::Registered(i) => EventFrame::new(INSCRIPTION, i),
            RosterEvent::Removed(r) => EventFrame::new(REMOVAL, r),
        };
        frame.with_seq(self.version())
    }
}

/// Live subscriber count of a channel.
/// Wire: `{ "subscriptionCount": 3 }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub subscription_count: usize,
}

impl PresencePayload {
    pub fn to_frame(&self) -> EventFrame {
        EventFrame::new(PRESENCE, self)
    }
}

/// First frame a viewer receives after joining a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub event: Event,
    pub subscription_count: usize,
}

impl SnapshotPayload {
    pub fn to_frame(&self) -> EventFrame {
        EventFrame::new(SNAPSHOT, self).with_seq(self.event.version)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("event '{event}' has no payload")]
    MissingPayload { event: String },

    #[error("malformed '{event}' payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a viewer can receive on an event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Roster(RosterEvent),
    Presence(PresencePayload),
    Snapshot(Box<SnapshotPayload>),
}

impl ChannelEvent {
    /// Decode a push frame. Frames the channel never carries (e.g. `tick`)
    /// come back as [`DecodeError::UnknownEvent`]; callers decide the policy.
    pub fn decode(frame: &EventFrame) -> Result<Self, DecodeError> {
        let payload = || {
            frame
                .payload
                .clone()
                .ok_or_else(|| DecodeError::MissingPayload {
                    event: frame.event.clone(),
                })
        };
        let malformed = |source| DecodeError::Malformed {
            event: frame.event.clone(),
            source,
        };

        match frame.event.as_str() {
            INSCRIPTION => serde_json::from_value(payload()?)
                .map(|i| ChannelEvent::Roster(RosterEvent::Registered(i)))
                .map_err(malformed),
            REMOVAL => serde_json::from_value(payload()?)
                .map(|r| ChannelEvent::Roster(RosterEvent::Removed(r)))
                .map_err(malformed),
            PRESENCE => serde_json::from_value(payload()?)
                .map(ChannelEvent::Presence)
                .map_err(malformed),
            SNAPSHOT => serde_json::from_value(payload()?)
                .map(|s| ChannelEvent::Snapshot(Box::new(s)))
                .map_err(malformed),
            other => Err(DecodeError::UnknownEvent(other.to_string())),
        }
    }
}
