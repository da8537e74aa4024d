use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".taskforge";

/// Prefix for environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "TASKFORGE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {field}: oracle timeout must be at least 1 second")]
    InvalidOracleTimeout { field: &'static str },

    #[error("Invalid rescan_interval_ms: {0}. Must be at least 1")]
    InvalidRescanInterval(u64),

    #[error("Oracle command cannot be empty")]
    EmptyOracleCommand,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging from the current
    /// directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .taskforge/config.yaml (project config)
    /// 3. .taskforge/local.yaml (local overrides, optional)
    /// 4. Environment variables (TASKFORGE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_root(".")
    }

    /// Same as [`load`](Self::load) with the project rooted at `root`.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.analyzer.oracle_timeout_secs == 0 {
            return Err(ConfigError::InvalidOracleTimeout {
                field: "analyzer.oracle_timeout_secs",
            });
        }
        if config.decomposer.oracle_timeout_secs == 0 {
            return Err(ConfigError::InvalidOracleTimeout {
                field: "decomposer.oracle_timeout_secs",
            });
        }

        if config.scheduler.rescan_interval_ms == 0 {
            return Err(ConfigError::InvalidRescanInterval(
                config.scheduler.rescan_interval_ms,
            ));
        }

        if config.oracle.command.trim().is_empty() {
            return Err(ConfigError::EmptyOracleCommand);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
