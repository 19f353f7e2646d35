use clap::Parser;

use jobforge::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = cli::load_and_merge_config(&cli).inspect_err(|_| {
        eprintln!("{}", Cli::get_validation_help());
    })?;

    cli::init_logger_from_settings(&settings)?;

    tracing::info!(
        name = %settings.application.name,
        version = %settings.application.version,
        "Starting jobforge"
    );

    cli::execute_command(&cli, settings).await?;
    Ok(())
}
