//! Plain-text roster summary posted to the messaging group after every
//! committed change.

use std::fmt::Write;

use chrono::FixedOffset;
use roster_core::types::{Event, TeamSlot};

use crate::error::ComposeError;

const KEEPER_MARK: &str = "🧤";

pub struct NotificationComposer {
    offset: FixedOffset,
}

impl NotificationComposer {
    /// `offset` is the zone the event date is rendered in.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Render the full roster of `event`.
    ///
    /// Layout:
    /// ```text
    /// Friday, November 6, 2026
    /// 8:00 PM
    /// <description>
    /// Address: <text>
    ///
    /// <url>
    ///
    /// Team Rojo
    ///
    /// 🧤. Ana
    /// 2. Bea
    /// 3.
    /// ...
    /// ```
    /// Playable teams always show `team_limit` rows (open rows are blank);
    /// the reserve team shows one row per player.
    pub fn compose(&self, event: &Event) -> Result<String, ComposeError> {
        if !event.teams.contains(&event.extra_team) {
            return Err(ComposeError::UnknownExtraTeam {
                team: event.extra_team.clone(),
            });
        }

        let local = event.date.with_timezone(&self.offset);
        let mut msg = String::new();
        let _ = writeln!(msg, "{}", local.format("%A, %B %-d, %Y"));
        let _ = writeln!(msg, "{}", local.format("%-I:%M %p"));
        let _ = writeln!(msg, "{}", event.description);
        let _ = writeln!(msg, "Address: {}", event.address.text);
        let _ = writeln!(msg);
        let _ = writeln!(msg, "{}", event.address.url);

        for slot in event.teams.iter() {
            let _ = writeln!(msg);
            if event.is_playable(&slot.name) {
                let _ = writeln!(msg, "Team {}", slot.name);
                let _ = writeln!(msg);
                for row in playable_rows(slot, event.team_limit) {
                    let _ = writeln!(msg, "{}", row);
                }
            } else {
                let _ = writeln!(msg, "{}", slot.name);
                let _ = writeln!(msg);
                for (i, p) in slot.players.iter().enumerate() {
                    let _ = writeln!(msg, "{}. {}", i + 1, p.name);
                }
            }
        }

        Ok(msg)
    }
}

/// Rows of a playable team. The keeper row comes first whenever the team
/// has a keeper or still has room for one; field rows are numbered by their
/// position in the list.
fn playable_rows(slot: &TeamSlot, team_limit: usize) -> Vec<String> {
    let keeper = slot.keeper();
    let field: Vec<&str> = slot
        .players
        .iter()
        .filter(|p| !p.is_keeper)
        .map(|p| p.name.as_str())
        .collect();

    let mut rows = Vec::with_capacity(team_limit.max(slot.players.len()));
    let keeper_row = keeper.is_some() || slot.players.len() < team_limit;
    if keeper_row {
        rows.push(row(KEEPER_MARK, keeper.map_or("", |k| k.name.as_str())));
    }

    let total = team_limit.max(rows.len() + field.len());
    let mut names = field.into_iter();
    while rows.len() < total {
        let number = (rows.len() + 1).to_string();
        rows.push(row(&number, names.next().unwrap_or("")));
    }
    rows
}

fn row(label: &str, name: &str) -> String {
    if name.is_empty() {
        format!("{}.", label)
    } else {
        format!("{}. {}", label, name)
    }
}
