//! Command executor for dispatching CLI commands
//!
//! Entry point for executing CLI commands after parsing and configuration
//! loading.

use super::handlers::{CheckCommandHandler, RunCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// No subcommand behaves like `run`.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli)?;

    match &cli.command {
        Some(Commands::Run { dry_run, .. }) => {
            RunCommandHandler::new(settings).execute(*dry_run).await
        }
        None => RunCommandHandler::new(settings).execute(false).await,
        Some(Commands::Check) => CheckCommandHandler::new(settings).execute().await,
    }
}

fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })
}
