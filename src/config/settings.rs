//! Configuration settings structures for jobforge
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::error::ConfigError;
use crate::jobs::{Backoff, JobPriority, RetryPolicy, RuntimeConfig};
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "jobforge".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/jobforge.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_handler_timeout() -> u64 {
    300
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_workers_per_type() -> usize {
    1
}

fn default_idle_backoff_ms() -> u64 {
    250
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_strategy() -> String {
    "exponential".to_string()
}

fn default_initial_delay() -> u64 {
    60
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    3600
}

fn default_payload() -> JsonValue {
    JsonValue::Object(Default::default())
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    /// Append to an existing file instead of truncating it
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime [`LoggerConfig`].
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format).map_err(
            |e| ConfigError::ValidationError {
                field: "logger.file".to_string(),
                message: e.to_string(),
            },
        )
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Job engine and runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout in seconds for handlers that do not declare their own
    #[serde(default = "default_handler_timeout")]
    pub default_timeout: u64,

    /// Interval between promotion passes in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Worker tasks started for each job type
    #[serde(default = "default_workers_per_type")]
    pub workers_per_type: usize,

    /// Idle worker poll interval in milliseconds
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Job types to run workers for; empty means all registered types
    #[serde(default)]
    pub job_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_handler_timeout(),
            tick_interval_ms: default_tick_interval_ms(),
            workers_per_type: default_workers_per_type(),
            idle_backoff_ms: default_idle_backoff_ms(),
            job_types: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            workers_per_type: self.workers_per_type,
            idle_backoff: Duration::from_millis(self.idle_backoff_ms),
            job_types: self.job_types.clone(),
        }
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Default retry policy for jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retry budget for jobs created without an explicit one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff: "exponential", "linear", or "fixed"
    #[serde(default = "default_backoff_strategy")]
    pub strategy: String,

    /// First retry delay in seconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay: u64,

    /// Added per retry in seconds (linear only)
    #[serde(default)]
    pub step: u64,

    /// Growth factor per retry (exponential only)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any single delay in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,

    /// Randomize exponential delays
    #[serde(default)]
    pub jitter: bool,

    /// Whether timed out attempts are retried
    #[serde(default = "default_true")]
    pub retry_on_timeout: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            strategy: default_backoff_strategy(),
            initial_delay: default_initial_delay(),
            step: 0,
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
            jitter: false,
            retry_on_timeout: default_true(),
        }
    }
}

impl RetrySettings {
    /// Build the engine's [`RetryPolicy`] from these settings.
    pub fn build_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let initial_delay = Duration::from_secs(self.initial_delay);
        let max_delay = Duration::from_secs(self.max_delay);

        let backoff = match self.strategy.to_lowercase().as_str() {
            "exponential" => Backoff::Exponential {
                initial_delay,
                multiplier: self.multiplier,
                max_delay,
                jitter: self.jitter,
            },
            "linear" => Backoff::Linear {
                initial_delay,
                step: Duration::from_secs(self.step),
                max_delay,
            },
            "fixed" => Backoff::Linear {
                initial_delay,
                step: Duration::ZERO,
                max_delay: initial_delay,
            },
            _ => {
                return Err(ConfigError::ValidationError {
                    field: "retry.strategy".to_string(),
                    message: format!(
                        "Invalid retry strategy '{}'. Valid strategies are: exponential, linear, fixed",
                        self.strategy
                    ),
                });
            }
        };

        Ok(RetryPolicy::new(self.max_retries, backoff).with_retry_on_timeout(self.retry_on_timeout))
    }
}

// ============================================================================
// Recurring Jobs
// ============================================================================

/// Recurring job registered when the runtime starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringJobConfig {
    pub job_type: String,

    /// Five-field cron expression, e.g. "*/5 * * * *"
    pub cron: String,

    #[serde(default = "default_payload")]
    pub payload: JsonValue,

    #[serde(default)]
    pub priority: JobPriority,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub recurring: Vec<RecurringJobConfig>,
}
