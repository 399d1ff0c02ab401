//! Arena configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::orchestrator::MatchSettings;
use crate::pool::PoolConfig;

/// Starting position for new matches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoardSetup {
    /// The standard chess starting position.
    #[default]
    Standard,
    /// The standard position with every pawn removed.
    NoPawns,
}

/// How colors are assigned to a freshly paired couple.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColorPolicy {
    /// Fair coin flip.
    #[default]
    Random,
    /// The player who queued first takes white.
    FirstArrivalWhite,
}

/// Top-level configuration for the arena server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Number of matches that may run at once.
    #[serde(default = "default_slots")]
    slots: usize,

    /// Thinking budget per player, in seconds.
    #[serde(default = "default_player_time_secs")]
    player_time_secs: u64,

    /// Bound on delivering the final outcome to each player, in milliseconds.
    #[serde(default = "default_broadcast_timeout_ms")]
    broadcast_timeout_ms: u64,

    /// Bound on waiting for players to release a finished match, in milliseconds.
    #[serde(default = "default_release_timeout_ms")]
    release_timeout_ms: u64,

    /// Color assignment for new pairs.
    #[serde(default)]
    color_policy: ColorPolicy,

    /// Starting position for new matches.
    #[serde(default)]
    board_setup: BoardSetup,

    /// Idle lifetime of a session entry, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    session_ttl_secs: u64,

    /// Interval between session sweeps, in seconds.
    #[serde(default = "default_session_sweep_secs")]
    session_sweep_secs: u64,
}

fn default_slots() -> usize {
    4
}

fn default_player_time_secs() -> u64 {
    1200
}

fn default_broadcast_timeout_ms() -> u64 {
    5000
}

fn default_release_timeout_ms() -> u64 {
    60_000
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_session_sweep_secs() -> u64 {
    60
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            player_time_secs: default_player_time_secs(),
            broadcast_timeout_ms: default_broadcast_timeout_ms(),
            release_timeout_ms: default_release_timeout_ms(),
            color_policy: ColorPolicy::default(),
            board_setup: BoardSetup::default(),
            session_ttl_secs: default_session_ttl_secs(),
            session_sweep_secs: default_session_sweep_secs(),
        }
    }
}

impl ArenaConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(slots = config.slots, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the slot count.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Overrides the starting position.
    pub fn with_board_setup(mut self, setup: BoardSetup) -> Self {
        self.board_setup = setup;
        self
    }

    #[track_caller]
    fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::new("slots must be at least 1".to_string()));
        }
        if self.player_time_secs == 0 {
            return Err(ConfigError::new(
                "player_time_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-match timing derived from this configuration.
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings::new(Duration::from_secs(self.player_time_secs))
            .with_broadcast_timeout(Duration::from_millis(self.broadcast_timeout_ms))
            .with_release_timeout(Duration::from_millis(self.release_timeout_ms))
            .with_setup(self.board_setup)
    }

    /// Pool configuration derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.slots, self.match_settings()).with_color_policy(self.color_policy)
    }

    /// Idle lifetime of a session entry.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Interval between session sweeps.
    pub fn session_sweep(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ArenaConfig::from_toml("").expect("empty config parses");
        assert_eq!(config, ArenaConfig::default());
        assert_eq!(*config.player_time_secs(), 1200);
        assert_eq!(*config.broadcast_timeout_ms(), 5000);
        assert_eq!(*config.color_policy(), ColorPolicy::Random);
    }

    #[test]
    fn test_snake_case_enums() {
        let config = ArenaConfig::from_toml(
            "color_policy = \"first_arrival_white\"\nboard_setup = \"no_pawns\"\n",
        )
        .expect("valid config");
        assert_eq!(*config.color_policy(), ColorPolicy::FirstArrivalWhite);
        assert_eq!(*config.board_setup(), BoardSetup::NoPawns);
        assert_eq!(config.board_setup().to_string(), "no_pawns");
    }

    #[test]
    fn test_zero_slots_rejected() {
        let err = ArenaConfig::from_toml("slots = 0").expect_err("zero slots");
        assert!(err.message.contains("slots"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn test_match_settings_conversion() {
        let config = ArenaConfig::from_toml("player_time_secs = 30\nrelease_timeout_ms = 250")
            .expect("valid config");
        let settings = config.match_settings();
        assert_eq!(*settings.max_time(), Duration::from_secs(30));
        assert_eq!(*settings.release_timeout(), Duration::from_millis(250));
        assert_eq!(*settings.broadcast_timeout(), Duration::from_secs(5));
    }
}
