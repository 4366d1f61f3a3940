use thiserror::Error;

/// Errors that can occur during roster operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No event with this id (or the id was malformed).
    #[error("event not found: {id}")]
    NotFound { id: String },

    #[error("event {id} is closed")]
    EventClosed { id: String },

    #[error("unknown team: {team}")]
    UnknownTeam { team: String },

    /// A playable team already holds `limit` players.
    #[error("team {team} is full ({limit} players)")]
    TeamFull { team: String, limit: usize },

    /// The name is already registered in some team of the event.
    #[error("player {name} is already registered in team {team}")]
    DuplicatePlayer { name: String, team: String },

    #[error("team {team} already has a keeper: {keeper}")]
    KeeperTaken { team: String, keeper: String },

    /// The player was registered by another account.
    #[error("player {name} belongs to another account")]
    NotOwner { name: String },

    /// Rejected event definition (create / seed).
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A thread panicked while holding the connection.
    #[error("database connection poisoned")]
    Poisoned,
}

impl StoreError {
    /// Machine-readable code for wire errors.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::EventClosed { .. } => "EVENT_CLOSED",
            StoreError::UnknownTeam { .. } => "UNKNOWN_TEAM",
            StoreError::TeamFull { .. } => "TEAM_FULL",
            StoreError::DuplicatePlayer { .. } => "DUPLICATE_PLAYER",
            StoreError::KeeperTaken { .. } => "KEEPER_TAKEN",
            StoreError::NotOwner { .. } => "NOT_OWNER",
            StoreError::InvalidEvent(_) => "INVALID_EVENT",
            StoreError::Database(_) | StoreError::Corrupt(_) | StoreError::Poisoned => {
                "STORAGE_ERROR"
            }
        }
    }

    /// True for rejections caused by the request, false for storage faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            StoreError::Database(_) | StoreError::Corrupt(_) | StoreError::Poisoned
        )
    }

    /// Message shown to the person who submitted the request.
    /// Storage details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::NotFound { .. } => "Event not found".to_string(),
            StoreError::EventClosed { .. } => "Registration for this event is closed".to_string(),
            StoreError::UnknownTeam { team } => format!("Team {} does not exist", team),
            StoreError::TeamFull { team, .. } => format!("Team {} is full", team),
            StoreError::DuplicatePlayer { name, team } => {
                format!("{} is already registered in team {}", name, team)
            }
            StoreError::KeeperTaken { team, keeper } => {
                format!("Team {} already has a keeper: {}", team, keeper)
            }
            StoreError::NotOwner { name } => {
                format!("Only the account that registered {} can cancel it", name)
            }
            StoreError::InvalidEvent(reason) => reason.clone(),
            StoreError::Database(_) | StoreError::Corrupt(_) | StoreError::Poisoned => {
                "Could not save the change, please try again".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
