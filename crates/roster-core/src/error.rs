use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RosterError {
    /// Short error code string used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
