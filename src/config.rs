// Configuration loading and parsing (bidroom.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ui: UiConfig,
    pub session: SessionConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket endpoint of the backend's auction namespace.
    pub socket_url: String,
    /// Base URL of the backend REST API.
    pub api_url: String,
}

/// Sound and animation are independent toggles: sound plays whenever it is
/// enabled, even with animations off.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub sound_enabled: bool,
    pub animation_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            ui: UiConfig::default(),
            session: SessionConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            socket_url: "ws://127.0.0.1:5000/auction".into(),
            api_url: "http://127.0.0.1:5000/api".into(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            sound_enabled: true,
            animation_enabled: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            db_path: "bidroom.sqlite".into(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            event_capacity: 256,
        }
    }
}

/// Parse a config file at `path`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load configuration from `config/bidroom.toml` in the working directory,
/// falling back to the platform config directory, then to built-in
/// defaults when no file exists. A present-but-broken file is an error, not
/// a silent fallback.
pub fn load_config() -> Result<Config, ConfigError> {
    let mut candidates = vec![PathBuf::from("config/bidroom.toml")];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "bidroom") {
        candidates.push(dirs.config_dir().join("bidroom.toml"));
    }

    for path in candidates {
        if path.exists() {
            info!("loading config from {}", path.display());
            return load_config_from(&path);
        }
    }

    info!("no config file found, using defaults");
    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert!(config.server.socket_url.starts_with("ws://"));
        assert!(config.ui.sound_enabled);
        assert!(config.ui.animation_enabled);
        assert!(config.channel.event_capacity > 0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            socket_url = "ws://auction.example.net/live"

            [ui]
            animation_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.socket_url, "ws://auction.example.net/live");
        // Unspecified keys keep their defaults.
        assert_eq!(config.server.api_url, ServerConfig::default().api_url);
        assert!(config.ui.sound_enabled);
        assert!(!config.ui.animation_enabled);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session.db_path, "bidroom.sqlite");
    }
}
