use roster_core::types::{Event, Teams};
use roster_protocol::events::{ChannelEvent, DecodeError, RosterEvent};
use roster_protocol::frames::EventFrame;
use tracing::{debug, warn};

/// Why an incoming frame left the view untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event name this view does not handle (e.g. `tick`, `presence`).
    UnknownEvent(String),
    /// Roster change for a team the snapshot does not have.
    UnknownTeam(String),
    /// Known event name with an unreadable payload.
    Malformed(String),
}

/// Result of feeding one change into the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Already reflected (redelivery or pre-snapshot change).
    Duplicate,
    Ignored(IgnoreReason),
    /// Changes were missed. Nothing was applied; rejoin the channel for a
    /// fresh snapshot.
    Resync { expected: u64, received: u64 },
}

/// One viewer's copy of an event roster.
///
/// Starts from the snapshot delivered on join and only moves forward through
/// broadcast changes, in version order.
#[derive(Debug, Clone)]
pub struct RosterView {
    event: Event,
}

impl RosterView {
    pub fn from_snapshot(event: Event) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn teams(&self) -> &Teams {
        &self.event.teams
    }

    pub fn version(&self) -> u64 {
        self.event.version
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn apply(&mut self, change: &RosterEvent) -> Outcome {
        let current = self.event.version;
        let received = change.version();
        if received <= current {
            debug!(received, current, "duplicate roster change");
            return Outcome::Duplicate;
        }
        if received != current + 1 {
            warn!(expected = current + 1, received, "roster change gap");
            return Outcome::Resync {
                expected: current + 1,
                received,
            };
        }

        // The version is consumed even when the team is unknown, so later
        // changes still line up.
        self.event.version = received;
        let Some(slot) = self.event.teams.get_mut(change.team()) else {
            warn!(team = change.team(), "change for unknown team ignored");
            return Outcome::Ignored(IgnoreReason::UnknownTeam(change.team().to_string()));
        };

        match change {
            RosterEvent::Registered(i) => slot.players.push(i.player.clone()),
            RosterEvent::Removed(r) => slot.players.retain(|p| !p.same_name(&r.player.name)),
        }
        Outcome::Applied
    }

    /// Decode a channel frame and apply it.
    ///
    /// A snapshot replaces the view when it is at least as recent. Anything
    /// that is not a roster change is ignored and logged.
    pub fn apply_frame(&mut self, frame: &EventFrame) -> Outcome {
        match ChannelEvent::decode(frame) {
            Ok(ChannelEvent::Roster(change)) => self.apply(&change),
            Ok(ChannelEvent::Snapshot(snapshot)) => {
                if snapshot.event.version < self.event.version {
                    return Outcome::Duplicate;
                }
                self.event = snapshot.event;
                Outcome::Applied
            }
            Ok(ChannelEvent::Presence(_)) => {
                Outcome::Ignored(IgnoreReason::UnknownEvent(frame.event.clone()))
            }
            Err(DecodeError::UnknownEvent(name)) => {
                debug!(event = %name, "unknown channel event ignored");
                Outcome::Ignored(IgnoreReason::UnknownEvent(name))
            }
            Err(e) => {
                warn!(error = %e, "undecodable channel event ignored");
                Outcome::Ignored(IgnoreReason::Malformed(frame.event.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use roster_core::types::{Address, EventId, EventStatus, Player};
    use roster_protocol::events::SnapshotPayload;

    fn snapshot() -> Event {
        Event {
            id: EventId::from("0192f0c2a7b87c3e9d1f2a3b4c5d6e7f"),
            date: chrono::Utc.with_ymd_and_hms(2026, 11, 7, 1, 0, 0).unwrap(),
            description: "Friday match".to_string(),
            address: Address {
                text: "Cancha 5".to_string(),
                url: "https://maps.example/c5".to_string(),
            },
            teams: Teams::from_names(["Rojo", "Azul", "Suplentes"]),
            extra_team: "Suplentes".to_string(),
            status: EventStatus::Open,
            team_limit: 7,
            version: 0,
        }
    }

    fn names(view: &RosterView, team: &str) -> Vec<String> {
        view.teams()
            .get(team)
            .unwrap()
            .players
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn register_then_remove_restores_roster() {
        let mut view = RosterView::from_snapshot(snapshot());
        let before = view.teams().clone();
        let ana = Player::new("Ana", "acc-1", false);

        assert_eq!(view.apply(&RosterEvent::registered("Rojo", ana.clone(), 1)), Outcome::Applied);
        assert_eq!(names(&view, "Rojo"), ["Ana"]);

        assert_eq!(view.apply(&RosterEvent::removed("Rojo", ana.to_ref(), 2)), Outcome::Applied);
        assert_eq!(view.teams(), &before);
        assert_eq!(view.version(), 2);
    }

    #[test]
    fn removal_matches_name_case_insensitively() {
        let mut view = RosterView::from_snapshot(snapshot());
        view.apply(&RosterEvent::registered("Azul", Player::new("Ana", "a", false), 1));
        let removal = Player::new("ANA", "a", false).to_ref();
        assert_eq!(view.apply(&RosterEvent::removed("Azul", removal, 2)), Outcome::Applied);
        assert!(names(&view, "Azul").is_empty());
    }

    #[test]
    fn redelivered_change_is_duplicate() {
        let mut view = RosterView::from_snapshot(snapshot());
        let ev = RosterEvent::registered("Rojo", Player::new("Ana", "a", false), 1);
        assert_eq!(view.apply(&ev), Outcome::Applied);
        assert_eq!(view.apply(&ev), Outcome::Duplicate);
        assert_eq!(names(&view, "Rojo"), ["Ana"]);
    }

    #[test]
    fn gap_requests_resync_without_applying() {
        let mut view = RosterView::from_snapshot(snapshot());
        let ev = RosterEvent::registered("Rojo", Player::new("Ana", "a", false), 3);
        assert_eq!(
            view.apply(&ev),
            Outcome::Resync {
                expected: 1,
                received: 3
            }
        );
        assert!(names(&view, "Rojo").is_empty());
        assert_eq!(view.version(), 0);
    }

    #[test]
    fn unknown_team_is_ignored_but_consumes_version() {
        let mut view = RosterView::from_snapshot(snapshot());
        let ev = RosterEvent::registered("Verde", Player::new("Ana", "a", false), 1);
        assert_eq!(
            view.apply(&ev),
            Outcome::Ignored(IgnoreReason::UnknownTeam("Verde".to_string()))
        );
        assert!(view.teams().get("Verde").is_none());
        let next = RosterEvent::registered("Rojo", Player::new("Bea", "a", false), 2);
        assert_eq!(view.apply(&next), Outcome::Applied);
    }

    #[test]
    fn frames_drive_the_view() {
        let mut view = RosterView::from_snapshot(snapshot());
        let frame = RosterEvent::registered("Suplentes", Player::new("Leo", "a", true), 1).to_frame();
        assert_eq!(view.apply_frame(&frame), Outcome::Applied);

        let tick = EventFrame::new("tick", serde_json::json!({ "ts": 1 }));
        assert_eq!(
            view.apply_frame(&tick),
            Outcome::Ignored(IgnoreReason::UnknownEvent("tick".to_string()))
        );

        let mut newer = snapshot();
        newer.version = 4;
        let frame = SnapshotPayload {
            event: newer.clone(),
            subscription_count: 1,
        }
        .to_frame();
        assert_eq!(view.apply_frame(&frame), Outcome::Applied);
        assert_eq!(view.event(), &newer);
    }

    #[test]
    fn scenario_from_two_viewers_converges() {
        // Rojo keeper joins, a reserve player joins, the keeper cancels.
        let changes = [
            RosterEvent::registered("Rojo", Player::new("Ana", "acc-1", true), 1),
            RosterEvent::registered("Suplentes", Player::new("Leo", "acc-2", false), 2),
            RosterEvent::removed("Rojo", Player::new("Ana", "acc-1", true).to_ref(), 3),
        ];

        let mut in_order = RosterView::from_snapshot(snapshot());
        for c in &changes {
            in_order.apply(c);
        }

        // Second viewer sees the first change twice.
        let mut redelivered = RosterView::from_snapshot(snapshot());
        for c in [&changes[0], &changes[0], &changes[1], &changes[2]] {
            redelivered.apply(c);
        }

        assert_eq!(in_order.event(), redelivered.event());
        assert!(names(&in_order, "Rojo").is_empty());
        assert_eq!(names(&in_order, "Suplentes"), ["Leo"]);
    }
}
