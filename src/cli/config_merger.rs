//! Configuration merger for CLI arguments and config files
//!
//! Applies CLI overrides on top of file-based configuration. CLI arguments
//! have the highest precedence.

use std::path::Path;

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Settings};

pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration for the given CLI arguments
    ///
    /// `--config` switches the loader to single-file mode and `--env` replaces
    /// the environment read from `JOBFORGE_APP_ENV`.
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;

        if let Some(ref path) = cli.config {
            Self::validate_config_file_access(path)?;
            loader = loader.with_file(path);
        }

        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }

        Ok(Self::new(loader.load()?))
    }

    fn validate_config_file_access(path: &Path) -> Result<(), ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::validation(
                "config_file",
                format!("Configuration path is not a file: '{}'", path.display()),
            ));
        }

        std::fs::File::open(path).map(|_| ()).map_err(|e| {
            ConfigError::validation(
                "config_file",
                format!("Cannot read configuration file '{}': {}", path.display(), e),
            )
        })
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// Returns a new validated Settings instance with CLI overrides applied.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        match command {
            Commands::Run {
                workers, log_level, ..
            } => {
                if let Some(workers) = workers {
                    config.engine.workers_per_type = *workers;
                }

                // Command-specific level beats --verbose/--quiet
                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
            }
            Commands::Check => {}
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}
