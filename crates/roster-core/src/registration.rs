//! Shape validation for registration and cancellation requests.
//!
//! Runs before any storage access. Only the request shape is checked here;
//! business rules (capacity, duplicates, keeper) belong to the roster store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum player name length, in characters, after trimming.
pub const MIN_NAME_CHARS: usize = 2;
/// Upper bound keeps notifications and broadcast frames small.
pub const MAX_NAME_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A team must be selected")]
    MissingTeam,

    #[error("The player name must be at least two characters long")]
    NameTooShort,

    #[error("The player name must be at most 64 characters long")]
    NameTooLong,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        "VALIDATION_ERROR"
    }
}

/// Registration as submitted by a client.
/// Wire: `{ "team": "Rojo", "playerName": " Ana ", "isKeeper": true }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub is_keeper: Option<bool>,
}

/// Cancellation as submitted by a client.
/// Wire: `{ "team": "Rojo", "playerName": "Ana" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub player_name: String,
}

/// A registration that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub team: String,
    pub player_name: String,
    pub is_keeper: bool,
}

/// A cancellation that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub team: String,
    pub player_name: String,
}

impl RegistrationRequest {
    /// Normalise the request: team unchanged, name trimmed, keeper defaulted.
    pub fn validate(&self) -> Result<Registration, ValidationError> {
        let team = validate_team(&self.team)?;
        let player_name = validate_name(&self.player_name)?;
        Ok(Registration {
            team,
            player_name,
            is_keeper: self.is_keeper.unwrap_or(false),
        })
    }
}

impl CancellationRequest {
    pub fn validate(&self) -> Result<Cancellation, ValidationError> {
        let team = validate_team(&self.team)?;
        let player_name = validate_name(&self.player_name)?;
        Ok(Cancellation { team, player_name })
    }
}

fn validate_team(team: &str) -> Result<String, ValidationError> {
    if team.trim().is_empty() {
        return Err(ValidationError::MissingTeam);
    }
    Ok(team.to_string())
}

fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    let chars = name.chars().count();
    if chars < MIN_NAME_CHARS {
        return Err(ValidationError::NameTooShort);
    }
    if chars > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }
    Ok(name.to_string())
}
