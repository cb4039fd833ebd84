// Configuration File Support
//
// TOML configuration for the quota gate with environment variable overrides.
// Loaded from the XDG config directory: ~/.config/quotagate/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::quota::QuotaPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Quota policy
    pub quota: QuotaPolicy,

    /// Record store configuration
    pub store: StoreConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend (file, memory)
    ///
    /// `memory` keeps records only for the life of the process, so it suits
    /// embedding the library rather than one-shot CLI calls.
    pub backend: String,

    /// Directory for the file backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "quotagate", "QuotaGate") {
        proj_dirs.data_dir().join("records")
    } else {
        PathBuf::from(".quotagate").join("records")
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/quotagate/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "quotagate", "QuotaGate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("quotagate").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - QUOTAGATE_LOG_LEVEL
    /// - QUOTAGATE_LOG_FORMAT
    /// - QUOTAGATE_STORE_BACKEND
    /// - QUOTAGATE_STORE_PATH
    /// - QUOTAGATE_MAX_QUOTA
    /// - QUOTAGATE_WINDOW_DAYS
    /// - QUOTAGATE_OVERDRAFT
    /// - QUOTAGATE_BASE_COOLDOWN_HOURS
    /// - QUOTAGATE_UNITS_PER_EXTRA_HOUR
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("QUOTAGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("QUOTAGATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(backend) = std::env::var("QUOTAGATE_STORE_BACKEND") {
            self.store.backend = backend;
        }
        if let Ok(path) = std::env::var("QUOTAGATE_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }

        if let Some(max_quota) = env_u32("QUOTAGATE_MAX_QUOTA").filter(|v| *v > 0) {
            self.quota.max_quota = max_quota;
        }
        if let Some(days) = env_u32("QUOTAGATE_WINDOW_DAYS").filter(|v| *v > 0) {
            self.quota.window_days = days;
        }
        if let Some(overdraft) = env_u32("QUOTAGATE_OVERDRAFT") {
            self.quota.overdraft = overdraft;
        }
        if let Some(hours) = env_u32("QUOTAGATE_BASE_COOLDOWN_HOURS") {
            self.quota.base_cooldown_hours = hours;
        }
        if let Some(units) = env_u32("QUOTAGATE_UNITS_PER_EXTRA_HOUR").filter(|v| *v > 0) {
            self.quota.units_per_extra_hour = units;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        match self.store.backend.to_lowercase().as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "Invalid store backend: {}. Must be 'file' or 'memory'",
                self.store.backend
            ),
        }
        if self.store.backend.eq_ignore_ascii_case("file") && self.store.path.as_os_str().is_empty() {
            anyhow::bail!("File store requires a non-empty path");
        }

        self.quota.validate()?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse::<u32>().ok())
}
