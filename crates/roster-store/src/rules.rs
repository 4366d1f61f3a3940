//! Roster business rules evaluated against an event snapshot.
//!
//! The manager runs these inside the write transaction, so the snapshot is
//! current when they pass. Order matters: the first failing rule is reported.

use roster_core::registration::Registration;
use roster_core::types::Event;

use crate::error::{Result, StoreError};
use crate::types::NewEvent;

pub fn check_registration(event: &Event, reg: &Registration) -> Result<()> {
    if event.is_closed() {
        return Err(StoreError::EventClosed {
            id: event.id.to_string(),
        });
    }

    let slot = event
        .teams
        .get(&reg.team)
        .ok_or_else(|| StoreError::UnknownTeam {
            team: reg.team.clone(),
        })?;

    if event.is_playable(&reg.team) {
        if reg.is_keeper {
            if let Some(keeper) = slot.keeper() {
                return Err(StoreError::KeeperTaken {
                    team: reg.team.clone(),
                    keeper: keeper.name.clone(),
                });
            }
        }
        if slot.players.len() >= event.team_limit {
            return Err(StoreError::TeamFull {
                team: reg.team.clone(),
                limit: event.team_limit,
            });
        }
    }

    if let Some((team, _)) = event.teams.find_player(&reg.player_name) {
        return Err(StoreError::DuplicatePlayer {
            name: reg.player_name.clone(),
            team: team.to_string(),
        });
    }

    Ok(())
}

pub fn check_new_event(new: &NewEvent, team_limit: usize) -> Result<()> {
    let invalid = |msg: String| Err(StoreError::InvalidEvent(msg));

    if new.teams.is_empty() {
        return invalid("an event needs at least one team".to_string());
    }
    for (i, team) in new.teams.iter().enumerate() {
        if team.trim().is_empty() {
            return invalid("team names must not be blank".to_string());
        }
        if new.teams[..i].contains(team) {
            return invalid(format!("duplicate team: {}", team));
        }
    }
    if !new.teams.contains(&new.extra_team) {
        return invalid(format!(
            "reserve team {} is not one of the event teams",
            new.extra_team
        ));
    }
    if team_limit == 0 {
        return invalid("team limit must be at least 1".to_string());
    }
    Ok(())
}
