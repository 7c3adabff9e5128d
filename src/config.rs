//! Application-level configuration loading, including the sync cadence and throttling windows.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TOUCHLINE_CONFIG_PATH";

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Sync cadence and throttling.
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// How often and how aggressively local changes are pushed to storage.
pub struct SyncConfig {
    /// Period of the goal/card auto-save tick.
    pub event_interval: Duration,
    /// Period of the player-time auto-save tick.
    pub player_time_interval: Duration,
    /// Minimum gap between two periodic goal/card sync attempts.
    pub event_min_gap: Duration,
    /// Player-time throttle window while many players are on the field.
    pub busy_window: Duration,
    /// Player-time throttle window otherwise.
    pub idle_window: Duration,
    /// Active players from which [`SyncConfig::busy_window`] applies.
    pub busy_player_threshold: usize,
    /// Segments pushed concurrently per chunk.
    pub player_time_chunk_size: usize,
    /// Pause between two player-time chunks.
    pub chunk_delay: Duration,
    /// Quiet period after a score change before syncing.
    pub score_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_interval: Duration::from_secs(20),
            player_time_interval: Duration::from_secs(30),
            event_min_gap: Duration::from_secs(10),
            busy_window: Duration::from_secs(15),
            idle_window: Duration::from_secs(45),
            busy_player_threshold: 8,
            player_time_chunk_size: 5,
            chunk_delay: Duration::from_millis(250),
            score_debounce: Duration::from_millis(1_500),
        }
    }
}

impl SyncConfig {
    /// Throttle window for player-time syncs given the number of players on the field.
    pub fn player_time_window(&self, active_players: usize) -> Duration {
        if active_players >= self.busy_player_threshold {
            self.busy_window
        } else {
            self.idle_window
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        sync = ?app_config.sync,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    sync: RawSyncConfig,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the `sync` section; every field is optional.
struct RawSyncConfig {
    event_interval_secs: Option<u64>,
    player_time_interval_secs: Option<u64>,
    event_min_gap_secs: Option<u64>,
    busy_window_secs: Option<u64>,
    idle_window_secs: Option<u64>,
    busy_player_threshold: Option<usize>,
    player_time_chunk_size: Option<usize>,
    chunk_delay_ms: Option<u64>,
    score_debounce_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            sync: value.sync.into(),
        }
    }
}

impl From<RawSyncConfig> for SyncConfig {
    fn from(raw: RawSyncConfig) -> Self {
        let defaults = SyncConfig::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };

        Self {
            event_interval: secs(raw.event_interval_secs, defaults.event_interval),
            player_time_interval: secs(
                raw.player_time_interval_secs,
                defaults.player_time_interval,
            ),
            event_min_gap: secs(raw.event_min_gap_secs, defaults.event_min_gap),
            busy_window: secs(raw.busy_window_secs, defaults.busy_window),
            idle_window: secs(raw.idle_window_secs, defaults.idle_window),
            busy_player_threshold: raw
                .busy_player_threshold
                .unwrap_or(defaults.busy_player_threshold),
            // A zero chunk size would make `chunks` panic.
            player_time_chunk_size: raw
                .player_time_chunk_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.player_time_chunk_size),
            chunk_delay: millis(raw.chunk_delay_ms, defaults.chunk_delay),
            score_debounce: millis(raw.score_debounce_ms, defaults.score_debounce),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"sync": {"busy_window_secs": 5, "player_time_chunk_size": 0}}"#)
                .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.sync.busy_window, Duration::from_secs(5));
        assert_eq!(config.sync.player_time_chunk_size, 5);
        assert_eq!(config.sync.idle_window, SyncConfig::default().idle_window);
    }

    #[test]
    fn throttle_window_shrinks_when_busy() {
        let config = SyncConfig::default();
        assert_eq!(config.player_time_window(2), config.idle_window);
        assert_eq!(config.player_time_window(8), config.busy_window);
        assert!(config.busy_window < config.idle_window);
    }
}
