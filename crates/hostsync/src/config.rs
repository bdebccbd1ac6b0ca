//! Settings loaded from environment variables.
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `HOSTSYNC_LOG` | `log_level` | `info` |
//! | `HOSTSYNC_TICK_RATE` | `game.tick_rate` | 60 |
//! | `HOSTSYNC_SYNC_INTERVAL_MS` | `game.sync_interval` | 100 |
//! | `HOSTSYNC_MAX_PLAYERS` | `game.max_players` | 8 |
//! | `HOSTSYNC_PREDICTION` | `game.prediction` | true |
//! | `HOSTSYNC_INTERPOLATION` | `game.interpolation` | true |

use std::env;
use std::str::FromStr;

use hostsync_engine::GameConfig;

/// Process-level settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Defaults for every session opened by a [`Peer`](crate::Peer).
    pub game: GameConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            game: GameConfig::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads settings through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(level) = lookup("HOSTSYNC_LOG") {
            settings.log_level = level;
        }
        if let Some(v) = parse(&lookup, "HOSTSYNC_TICK_RATE")? {
            settings.game.tick_rate = v;
        }
        if let Some(v) = parse(&lookup, "HOSTSYNC_SYNC_INTERVAL_MS")? {
            settings.game.sync_interval = v;
        }
        if let Some(v) = parse(&lookup, "HOSTSYNC_MAX_PLAYERS")? {
            settings.game.max_players = v;
        }
        if let Some(v) = parse(&lookup, "HOSTSYNC_PREDICTION")? {
            settings.game.prediction = v;
        }
        if let Some(v) = parse(&lookup, "HOSTSYNC_INTERPOLATION")? {
            settings.game.interpolation = v;
        }

        Ok(settings)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
