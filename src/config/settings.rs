//! Service settings and configuration management
//!
//! These are process-level settings. Pool-level knobs (retry count, ban
//! duration, quotas) live in the persisted pool document instead.

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7860
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Where the pool document is persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
}

fn default_state_path() -> String {
    "./data/config.json".to_string()
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Image download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Per-image bound, independent of the upstream call timeout
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

fn default_download_timeout() -> u64 {
    120
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout(),
        }
    }
}

/// Background maintenance configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_sweep_interval")]
    pub ban_sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            ban_sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Settings {
    /// Load settings from the configuration file named by `SD_BRIDGE_CONFIG`
    /// (default `config/default.toml`) and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var("SD_BRIDGE_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("state.path", default_state_path())?
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with SD_BRIDGE_)
            .add_source(
                Environment::with_prefix("SD_BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.state.path.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "State path cannot be empty".to_string(),
            )));
        }

        if self.download.timeout_secs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Download timeout must be at least one second".to_string(),
            )));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Invalid log format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            ))));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            state: StateConfig::default(),
            download: DownloadConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}
