//! CLI module for jobforge
//!
//! Argument parsing with clap, merging of CLI overrides into file-based
//! configuration, and the `run`/`check` command handlers.

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};

use anyhow::Context;

use crate::config::Settings;
use crate::logger::init_logger;

/// Load configuration files and apply CLI overrides
///
/// # Errors
/// Returns error if configuration loading, merging, or validation fails
pub fn load_and_merge_config(cli: &Cli) -> anyhow::Result<Settings> {
    let merger = ConfigurationMerger::from_cli(cli).context("Failed to load configuration")?;

    merger
        .merge_cli_args(cli)
        .context("Failed to apply command-line overrides")
}

/// Initialize the global tracing subscriber from settings
///
/// # Errors
/// Returns error if the logger configuration is invalid or a subscriber is
/// already installed
pub fn init_logger_from_settings(settings: &Settings) -> anyhow::Result<()> {
    let logger_config = settings
        .logger
        .clone()
        .into_logger_config()
        .context("Invalid logger configuration")?;

    init_logger(logger_config)
}
