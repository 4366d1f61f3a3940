use chrono::{FixedOffset, Offset, Utc};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Playable team capacity when an event does not set its own.
pub const DEFAULT_TEAM_LIMIT: usize = 7;
/// America/Bogota has no DST, so a fixed offset is exact.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -5 * 60;
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024; // inbound WS frame cap
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const CHANNEL_CAPACITY: usize = 256;
pub const RELAY_TIMEOUT_MS: u64 = 10_000;

/// Top-level config (roster.toml + ROSTER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub roster: RosterRules,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Outbound group relay. Absent means notifications are only logged.
    #[serde(default)]
    pub relay: Option<RelayConfig>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            roster: RosterRules::default(),
            realtime: RealtimeConfig::default(),
            relay: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Token,
            token: Some("change-me".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Business rules applied to newly created events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterRules {
    #[serde(default = "default_team_limit")]
    pub team_limit: usize,
    /// Offset used when rendering event dates in notifications.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

impl Default for RosterRules {
    fn default() -> Self {
        Self {
            team_limit: DEFAULT_TEAM_LIMIT,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-channel buffer. Viewers lagging further than this must rejoin.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: CHANNEL_CAPACITY,
            heartbeat_secs: HEARTBEAT_INTERVAL_SECS,
        }
    }
}

/// HTTP relay to the external messaging group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL (without trailing slash); `/sendMessage` is appended.
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Group identifier every notification is addressed to.
    pub group_id: String,
    #[serde(default = "default_relay_timeout")]
    pub timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_team_limit() -> usize {
    DEFAULT_TEAM_LIMIT
}
fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
fn default_channel_capacity() -> usize {
    CHANNEL_CAPACITY
}
fn default_heartbeat() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}
fn default_api_key_header() -> String {
    "x-api-key".to_string()
}
fn default_relay_timeout() -> u64 {
    RELAY_TIMEOUT_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.roster/roster.db", home)
}

impl RosterConfig {
    /// Load config from a TOML file with ROSTER_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.roster/roster.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RosterConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ROSTER_").split("__"))
            .extract()
            .map_err(|e| crate::error::RosterError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.roster.team_limit == 0 {
            return Err(crate::error::RosterError::Config(
                "roster.team_limit must be at least 1".to_string(),
            ));
        }
        if self.roster.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(crate::error::RosterError::Config(format!(
                "roster.utc_offset_minutes out of range: {}",
                self.roster.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Offset used by the notification composer.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.roster.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.roster/roster.toml", home)
}
