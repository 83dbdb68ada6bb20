//! Client Configuration
//!
//! Configuration management for the Ping chat client, stored as TOML in
//! `<config_dir>/ping-chat/client.toml`.

use anyhow::{Context, Result};
use ping_chat_core::{RealtimeConfig, ServiceEndpoints, TokenStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "client.toml";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Realtime channel configuration
    #[serde(default)]
    pub realtime: RealtimeSettings,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Storage paths
    pub paths: PathConfig,
}

/// Service endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// User service base URL, including the API prefix
    #[serde(default = "default_user_service")]
    pub user_service: String,

    /// Chat service base URL, including the API prefix
    #[serde(default = "default_chat_service")]
    pub chat_service: String,

    /// Realtime WebSocket URL of the chat service
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Realtime channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Reconnection attempts before giving up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Connection handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle time after the last keystroke before `stopTyping` is sent
    #[serde(default = "default_typing_idle")]
    pub typing_idle_ms: u64,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Days a stored token stays valid
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_days: i64,
}

/// Storage paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Configuration directory
    pub config_dir: PathBuf,

    /// Data directory (token file)
    pub data_dir: PathBuf,
}

fn default_user_service() -> String {
    ServiceEndpoints::default().user_service
}

fn default_chat_service() -> String {
    ServiceEndpoints::default().chat_service
}

fn default_realtime_url() -> String {
    RealtimeConfig::default().url
}

fn default_request_timeout() -> u64 {
    20
}

fn default_reconnect_attempts() -> u32 {
    ping_chat_core::recovery::MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay() -> u64 {
    ping_chat_core::recovery::RECONNECT_DELAY.as_millis() as u64
}

fn default_connect_timeout() -> u64 {
    ping_chat_core::recovery::CONNECT_TIMEOUT.as_secs()
}

fn default_typing_idle() -> u64 {
    ping_chat_core::TYPING_IDLE.as_millis() as u64
}

fn default_token_lifetime() -> i64 {
    ping_chat_core::TOKEN_LIFETIME_DAYS
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            user_service: default_user_service(),
            chat_service: default_chat_service(),
            realtime_url: default_realtime_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay(),
            connect_timeout_secs: default_connect_timeout(),
            typing_idle_ms: default_typing_idle(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_lifetime_days: default_token_lifetime(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".local/share"))
                .join("ping-chat"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: ServicesConfig::default(),
            realtime: RealtimeSettings::default(),
            session: SessionConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ping-chat")
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

impl Config {
    /// Load configuration from the default location, creating it if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_path())
    }

    /// Load configuration from `path`, creating a default file if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let mut config = Config::default();
            if let Some(parent) = path.parent() {
                config.paths.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.config_dir).context("Failed to create config directory")?;
        fs::create_dir_all(&self.paths.data_dir).context("Failed to create data directory")?;
        Ok(())
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints {
            user_service: self.services.user_service.clone(),
            chat_service: self.services.chat_service.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.services.request_timeout_secs)
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: self.services.realtime_url.clone(),
            reconnect_attempts: self.realtime.reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.realtime.reconnect_delay_ms),
            connect_timeout: Duration::from_secs(self.realtime.connect_timeout_secs),
        }
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.realtime.typing_idle_ms)
    }

    /// Token store in the data directory
    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.paths.data_dir).with_lifetime_days(self.session.token_lifetime_days)
    }
}
