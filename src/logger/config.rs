//! Runtime configuration for the logger

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::logger::error::LoggerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub console: ConsoleConfig,
    pub file: FileConfig,
    /// Level name or a full `EnvFilter` directive such as `jobforge=debug,info`
    pub level: String,
}

impl LoggerConfig {
    pub fn new(console: ConsoleConfig, file: FileConfig, level: String) -> Result<Self> {
        let config = Self {
            console,
            file,
            level,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.parse_level()
            .with_context(|| format!("Invalid log level: {}", self.level))?;

        self.file
            .validate()
            .context("Invalid file configuration")?;

        if !self.console.enabled && !self.file.enabled {
            anyhow::bail!("At least one output (console or file) must be enabled");
        }

        Ok(())
    }

    /// Base level of the filter. For directive strings this is the
    /// level of the last bare entry, e.g. `info` in `jobforge=debug,info`.
    pub fn parse_level(&self) -> Result<Level> {
        let base = self
            .level
            .split(',')
            .map(str::trim)
            .filter(|d| !d.contains('='))
            .last();

        match base {
            None => {
                tracing_subscriber::EnvFilter::try_new(&self.level)
                    .with_context(|| format!("Invalid filter directive '{}'", self.level))?;
                Ok(Level::INFO)
            }
            Some(level) => match level.to_lowercase().as_str() {
                "trace" => Ok(Level::TRACE),
                "debug" => Ok(Level::DEBUG),
                "info" => Ok(Level::INFO),
                "warn" => Ok(Level::WARN),
                "error" => Ok(Level::ERROR),
                _ => anyhow::bail!(
                    "Invalid log level '{}'. Valid levels are: trace, debug, info, warn, error",
                    level
                ),
            },
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub colored: bool,
}

impl ConsoleConfig {
    pub fn new(enabled: bool, colored: bool) -> Self {
        Self { enabled, colored }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub append: bool,
    pub format: LogFormat,
}

impl FileConfig {
    pub fn new(enabled: bool, path: PathBuf, append: bool, format: LogFormat) -> Result<Self> {
        let config = Self {
            enabled,
            path,
            append,
            format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Pure check; the log directory is created when the logger starts.
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.path.as_os_str().is_empty() {
            anyhow::bail!("File path cannot be empty when file output is enabled");
        }
        Ok(())
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("logs/jobforge.log"),
            append: true,
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggerError::format(format!(
                "Invalid log format '{}'. Valid formats are: full, compact, json",
                s
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Full => "full",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LoggerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_level() {
        let mut config = LoggerConfig::default();
        config.level = "DEBUG".to_string();
        assert_eq!(config.parse_level().unwrap(), Level::DEBUG);

        config.level = "jobforge=trace,warn".to_string();
        assert_eq!(config.parse_level().unwrap(), Level::WARN);

        config.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_at_least_one_output() {
        let mut config = LoggerConfig::default();
        config.console.enabled = false;
        assert!(config.validate().is_err());

        config.file.enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_path_rejected() {
        assert!(FileConfig::new(true, PathBuf::new(), true, LogFormat::Json).is_err());
        assert!(FileConfig::new(false, PathBuf::new(), true, LogFormat::Json).is_ok());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(LoggerError::Format { .. })
        ));
    }
}
