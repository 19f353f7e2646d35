//! Configuration validation logic
//!
//! Validation methods for all configuration structures, checking that
//! values are within acceptable ranges and formats.

use crate::config::error::ConfigError;
use crate::config::settings::{
    EngineConfig, FileSettings, LoggerSettings, RecurringJobConfig, RetrySettings, Settings,
};
use crate::jobs::{CronEvaluator, CronerEvaluator};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Valid retry backoff strategies
const VALID_RETRY_STRATEGIES: &[&str] = &["exponential", "linear", "fixed"];

/// Upper bound for the configured retry budget
const MAX_RETRY_BUDGET: u32 = 100;

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - If file logging is enabled, path must not be empty
    /// - Log format must be one of: full, compact, json
    /// - At least one output must be enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        self.file.validate()?;

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        Ok(())
    }
}

impl EngineConfig {
    /// Validate engine configuration
    ///
    /// # Validation Rules
    /// - Default handler timeout must be greater than 0
    /// - Tick interval must be greater than 0
    /// - At least one worker per job type
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout == 0 {
            return Err(ConfigError::validation(
                "engine.default_timeout",
                "Default handler timeout must be greater than 0 seconds.",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::validation(
                "engine.tick_interval_ms",
                "Tick interval must be greater than 0 milliseconds.",
            ));
        }

        if self.workers_per_type == 0 {
            return Err(ConfigError::validation(
                "engine.workers_per_type",
                "At least one worker per job type is required.",
            ));
        }

        if let Some(job_type) = self.job_types.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: "engine.job_types".to_string(),
                message: format!("Job type '{}' cannot be blank.", job_type),
            });
        }

        Ok(())
    }
}

impl RetrySettings {
    /// Validate retry settings
    ///
    /// # Validation Rules
    /// - Strategy must be one of: exponential, linear, fixed
    /// - Retry budget cannot exceed 100
    /// - Exponential multiplier must be finite and at least 1.0
    /// - Max delay cannot be below the initial delay
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strategy = self.strategy.to_lowercase();
        if !VALID_RETRY_STRATEGIES.contains(&strategy.as_str()) {
            return Err(ConfigError::ValidationError {
                field: "retry.strategy".to_string(),
                message: format!(
                    "Invalid retry strategy '{}'. Valid strategies are: {}",
                    self.strategy,
                    VALID_RETRY_STRATEGIES.join(", ")
                ),
            });
        }

        if self.max_retries > MAX_RETRY_BUDGET {
            return Err(ConfigError::ValidationError {
                field: "retry.max_retries".to_string(),
                message: format!("Max retries cannot exceed {}.", MAX_RETRY_BUDGET),
            });
        }

        if strategy == "exponential" && (!self.multiplier.is_finite() || self.multiplier < 1.0) {
            return Err(ConfigError::ValidationError {
                field: "retry.multiplier".to_string(),
                message: format!(
                    "Multiplier must be a finite number of at least 1.0, got {}.",
                    self.multiplier
                ),
            });
        }

        if strategy != "fixed" && self.max_delay < self.initial_delay {
            return Err(ConfigError::ValidationError {
                field: "retry.max_delay".to_string(),
                message: format!(
                    "Max delay ({}) cannot be less than initial delay ({}).",
                    self.max_delay, self.initial_delay
                ),
            });
        }

        Ok(())
    }
}

impl RecurringJobConfig {
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.job_type.trim().is_empty() || self.job_type.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationError {
                field: format!("recurring[{}].job_type", index),
                message: format!("Invalid job type '{}'.", self.job_type),
            });
        }

        CronerEvaluator::new()
            .validate(&self.cron)
            .map_err(|e| ConfigError::ValidationError {
                field: format!("recurring[{}].cron", index),
                message: e.to_string(),
            })
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logger.validate()?;
        self.engine.validate()?;
        self.retry.validate()?;
        for (index, recurring) in self.recurring.iter().enumerate() {
            recurring.validate(index)?;
        }
        Ok(())
    }
}
