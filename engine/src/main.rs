// Insight research agent
// Main entry point for the insight binary

use clap::Parser;
use insight_engine::cli::{Cli, Command};
use insight_engine::config::Config;
use insight_engine::handlers::{handle_doctor, handle_init_index, handle_run, OutputFormat};
use insight_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the configured level; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");

    tracing::info!("Insight Engine v{} ({})", version, commit);

    // Handle commands
    match cli.resolved_command() {
        Command::Run {
            objective,
            max_iterations,
        } => {
            tracing::info!("Starting agent loop...");
            handle_run(&config, objective, max_iterations, cli.quiet, format).await
        }

        Command::InitIndex => {
            tracing::info!("Initializing vector index...");
            handle_init_index(&config, format).await
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
