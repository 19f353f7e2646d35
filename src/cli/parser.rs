//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// A background job engine with priorities, retries and cron schedules
#[derive(Parser, Debug)]
#[command(name = "jobforge")]
#[command(about = "A background job engine with priorities, retries and cron schedules")]
#[command(long_about = "
Jobforge runs typed background jobs from per-type priority queues. Failed jobs
are retried with linear or exponential backoff, delayed jobs are promoted when
due, and recurring jobs are materialized from cron expressions.

EXAMPLES:
    # Start the runtime with default configuration
    jobforge run

    # Run two workers per job type
    jobforge run --workers 2

    # Use custom configuration file
    jobforge --config /path/to/config.toml run

    # Run in development mode with verbose logging
    jobforge --env development --verbose run

    # Check configuration without starting workers
    jobforge run --dry-run

    # Validate configuration and cron expressions
    jobforge check

For more information about configuration options, see the documentation.
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Specify a custom configuration file to use instead of the layered
    /// configuration directory. The file must exist and be readable TOML.
    ///
    /// Example: --config /etc/jobforge/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` layer is loaded.
    ///
    /// Available values: development (dev), production (prod), test
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Increases log output to debug level. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Reduces log output to error level only. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the job runtime (default)
    ///
    /// Registers the built-in handlers and configured recurring schedules, then
    /// runs the promotion tick and worker loops until Ctrl+C or SIGTERM.
    ///
    /// Examples:
    ///   jobforge run                  # Start with defaults
    ///   jobforge run --workers 4      # Four workers per job type
    ///   jobforge run --dry-run        # Validate config without starting
    Run {
        /// Workers per job type
        ///
        /// Overrides `engine.workers_per_type`. Must be between 1 and 256.
        #[arg(short, long, value_name = "N", value_parser = super::validation::validate_workers)]
        workers: Option<usize>,

        /// Log level override
        ///
        /// Takes precedence over both the configuration file and the global
        /// --verbose/--quiet flags.
        ///
        /// Available levels: error, warn, info, debug, trace
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        ///
        /// Builds the engine and registers schedules without starting workers.
        /// Returns exit code 0 if valid, non-zero if invalid.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration and cron expressions
    ///
    /// Loads the configuration, validates every section and prints the next
    /// firing time of each configured recurring job.
    Check,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Run {
            workers: Some(_),
            dry_run: true,
            ..
        }) = self.command
        {
            return Err("--workers has no effect together with --dry-run".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }

    /// Get detailed help for validation errors
    pub fn get_validation_help() -> &'static str {
        r#"
Common validation errors and solutions:

Worker validation:
  - Workers must be between 1 and 256
  - Cannot be combined with --dry-run
  - Example: --workers 4

Configuration file validation:
  - File must exist and be readable
  - File must be in TOML format
  - Example: --config /path/to/config.toml

Recurring job validation:
  - Cron expressions take 5 fields, or 6 with leading seconds
  - Example: cron = "*/5 * * * *"

For more help, use: jobforge help <subcommand>
"#
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}
