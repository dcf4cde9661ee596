//! `malscan config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub async fn execute(
    config_path: Option<&Path>,
    output_format: OutputFormat,
    args: ConfigArgs,
) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config_path, output_format),
        ConfigCommands::Path => show_path(config_path),
        ConfigCommands::Init { force } => init_config(config_path, force),
    }
}

fn show_config(config_path: Option<&Path>, output_format: OutputFormat) -> Result<()> {
    let (config, path) = Config::load(config_path)?;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&config)?),
        _ => {
            let source = if path.exists() {
                path.display().to_string()
            } else {
                format!("{} (not created, showing defaults)", path.display())
            };
            println!("{} {}", "# Effective configuration from".dimmed(), source.dimmed());
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn show_path(config_path: Option<&Path>) -> Result<()> {
    let path = Config::resolve_path(config_path)?;
    println!("{}", path.display());
    Ok(())
}

fn init_config(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = Config::resolve_path(config_path)?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\n\n\
             Use --force to overwrite it.",
            path.display()
        );
    }

    Config::default().save(&path)?;
    println!("{} Wrote {}", "Success:".green().bold(), path.display().to_string().cyan());
    Ok(())
}
