use serde::{Deserialize, Serialize};

/// Main configuration structure for Taskforge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Complexity analyzer configuration
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Task decomposer configuration
    #[serde(default)]
    pub decomposer: DecomposerConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Complexity oracle command configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Complexity analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalyzerConfig {
    /// Seconds to wait for an oracle reply before falling back to the heuristic
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

const fn default_oracle_timeout_secs() -> u64 {
    60
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

/// Task decomposer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DecomposerConfig {
    /// Seconds to wait for a breakdown before falling back to the fixed chain
    #[serde(default = "default_decomposer_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

const fn default_decomposer_timeout_secs() -> u64 {
    120
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_secs: default_decomposer_timeout_secs(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Interval between periodic scheduling passes for waiting subtasks
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
}

const fn default_rescan_interval_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rescan_interval_ms: default_rescan_interval_ms(),
        }
    }
}

/// Local command used as the complexity oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OracleConfig {
    /// Executable to run
    #[serde(default = "default_oracle_command")]
    pub command: String,

    /// Arguments placed before the prompt
    #[serde(default = "default_oracle_args")]
    pub args: Vec<String>,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

fn default_oracle_command() -> String {
    "claude".to_string()
}

fn default_oracle_args() -> Vec<String> {
    vec!["--print".to_string()]
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: default_oracle_command(),
            args: default_oracle_args(),
            working_dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
