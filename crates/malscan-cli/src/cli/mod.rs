//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use std::path::Path;

use crate::config::Config;
use crate::output::OutputFormat;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    crate::logging::init(cli.verbose, !cli.no_color);

    let config_path = cli.config.as_deref();

    // Dispatch to appropriate command
    match cli.command {
        Commands::Scan(args) => {
            commands::scan::execute(context(config_path, cli.output, cli.no_color)?, args).await
        }
        Commands::Engines(args) => {
            commands::engines::execute(context(config_path, cli.output, cli.no_color)?, args).await
        }
        Commands::Update(args) => {
            commands::update::execute(context(config_path, cli.output, cli.no_color)?, args).await
        }
        // Works without loading, so a broken file can still be located and replaced.
        Commands::Config(args) => {
            commands::config::execute(config_path, cli.output.unwrap_or_default(), args).await
        }
    }
}

/// Load configuration and build the shared command context.
fn context(
    config_path: Option<&Path>,
    output: Option<OutputFormat>,
    no_color: bool,
) -> Result<commands::Context> {
    let (config, path) = Config::load(config_path)?;
    tracing::debug!(path = %path.display(), engines = config.engines.len(), "loaded configuration");

    // CLI flag, then config file, then pretty
    let output_format = output.or(config.output_format).unwrap_or(OutputFormat::Pretty);

    Ok(commands::Context {
        config,
        output_format,
        no_color,
    })
}
