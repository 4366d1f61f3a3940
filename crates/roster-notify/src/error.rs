use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// The event's reserve team is not one of its teams.
    #[error("reserve team {team} is not a team of the event")]
    UnknownExtraTeam { team: String },
}

/// Errors raised while delivering a notification to the messaging group.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The provider could not be reached.
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("relay HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status from the provider.
    #[error("relay API error {status}: {message}")]
    Api { status: u16, message: String },

    /// 2xx response with `success: false`.
    #[error("relay rejected message: {0}")]
    Rejected(String),

    #[error("unreadable relay response: {0}")]
    Parse(String),

    #[error("relay timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("relay configuration error: {0}")]
    Config(String),
}
