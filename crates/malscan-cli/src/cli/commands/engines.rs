//! `malscan engines` - Installation state of each configured engine.

use anyhow::Result;
use colored::Colorize;
use malscan_core::EngineStatus;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::EnginesArgs;
use crate::output::print_structured;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Engine")]
    engine: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Engine Path")]
    engine_path: String,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    engine: &'a str,
    installed: bool,
    version: Option<&'a str>,
    version_error: Option<&'a str>,
    platform: String,
    engine_path: String,
    update_path: String,
}

pub async fn execute(ctx: Context, args: EnginesArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator(&ctx.config.scan, &args.engines)?;
    let statuses = orchestrator.engine_status().await;

    let rows: Vec<CsvRow<'_>> = statuses
        .iter()
        .map(|s| CsvRow {
            engine: &s.descriptor.name,
            installed: s.installed,
            version: s.version.as_deref(),
            version_error: s.version_error.as_deref(),
            platform: s.descriptor.platform.to_string(),
            engine_path: s.descriptor.engine_path.display().to_string(),
            update_path: s.descriptor.update_path.display().to_string(),
        })
        .collect();
    if !print_structured(ctx.output_format, &statuses, &rows)? {
        print_statuses_pretty(&statuses);
    }

    Ok(())
}

fn print_statuses_pretty(statuses: &[EngineStatus]) {
    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|s| StatusRow {
            engine: s.descriptor.name.clone(),
            installed: if s.installed {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
            version: match (&s.version, &s.version_error) {
                (Some(v), _) => v.clone(),
                (None, Some(e)) => e.yellow().to_string(),
                (None, None) => "-".dimmed().to_string(),
            },
            platform: s.descriptor.platform.to_string(),
            engine_path: s.descriptor.engine_path.display().to_string(),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));

    let installed = statuses.iter().filter(|s| s.installed).count();
    println!(
        "\n{} of {} engines installed",
        installed.to_string().bold(),
        statuses.len()
    );
}
