//! `malscan scan` - Scan a file with every configured engine.

use anyhow::{Context as _, Result};
use colored::Colorize;
use malscan_core::{ScanReport, Verdict, VerdictErrorKind, VerdictState};
use malscan_engines::Artifact;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tokio::io::AsyncReadExt;

use super::Context;
use crate::cli::args::ScanArgs;
use crate::output::print_structured;

#[derive(Tabled)]
struct VerdictRow {
    #[tabled(rename = "Engine")]
    engine: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
    #[tabled(rename = "Engine Version")]
    version: String,
    #[tabled(rename = "Definitions")]
    definitions: String,
    #[tabled(rename = "Time")]
    elapsed: String,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    engine: &'a str,
    state: &'static str,
    label: Option<&'a str>,
    engine_version: Option<&'a str>,
    definitions_date: Option<String>,
    error_kind: Option<VerdictErrorKind>,
    error: Option<&'a str>,
}

pub async fn execute(ctx: Context, args: ScanArgs) -> Result<()> {
    let mut settings = ctx.config.scan.clone();
    if let Some(deadline) = args.deadline {
        settings.global_deadline_secs = deadline;
        settings.process_timeout_secs = settings.process_timeout_secs.min(deadline);
    }

    let orchestrator = ctx.orchestrator(&settings, &args.engines)?;
    let artifact = read_artifact(&args).await?;
    let report = orchestrator.scan_all(&artifact).await?;

    let rows: Vec<CsvRow<'_>> = report.verdicts.values().map(csv_row).collect();
    if !print_structured(ctx.output_format, &report, &rows)? {
        print_report_pretty(&report);
    }

    Ok(())
}

async fn read_artifact(args: &ScanArgs) -> Result<Artifact> {
    let mut artifact = if args.file == Path::new("-") {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .context("Failed to read stdin")?;
        Artifact::new(bytes)
    } else {
        let bytes = tokio::fs::read(&args.file)
            .await
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        let artifact = Artifact::new(bytes);
        match args.file.file_name() {
            Some(name) => artifact.with_file_name(name.to_string_lossy()),
            None => artifact,
        }
    };

    if let Some(mime) = &args.mime {
        artifact = artifact.with_media_type(mime.as_str());
    }
    Ok(artifact)
}

const fn state_label(state: VerdictState) -> &'static str {
    match state {
        VerdictState::Clean => "clean",
        VerdictState::Infected => "infected",
        VerdictState::Inconclusive => "error",
    }
}

fn csv_row(verdict: &Verdict) -> CsvRow<'_> {
    CsvRow {
        engine: &verdict.engine,
        state: state_label(verdict.state()),
        label: verdict.infected_label(),
        engine_version: verdict.engine_version.as_deref(),
        definitions_date: verdict.definitions_date.map(|d| d.to_rfc3339()),
        error_kind: verdict.error().map(|e| e.kind),
        error: verdict.error().map(|e| e.message.as_str()),
    }
}

fn table_row(verdict: &Verdict) -> VerdictRow {
    let (result, detail) = match verdict.state() {
        VerdictState::Infected => (
            "INFECTED".red().bold().to_string(),
            verdict.infected_label().unwrap_or("-").to_string(),
        ),
        VerdictState::Clean => ("clean".green().to_string(), String::new()),
        VerdictState::Inconclusive => (
            "error".yellow().to_string(),
            verdict
                .error()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        ),
    };

    VerdictRow {
        engine: verdict.engine.clone(),
        result,
        detail,
        version: verdict.engine_version.clone().unwrap_or_default(),
        definitions: verdict
            .definitions_date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        elapsed: verdict
            .elapsed
            .map(|e| format!("{:.2}s", e.as_secs_f64()))
            .unwrap_or_default(),
    }
}

fn print_report_pretty(report: &ScanReport) {
    let artifact = &report.artifact;
    println!("{} {}", "Artifact:".bold(), artifact.sha256.cyan());
    if let Some(name) = &artifact.file_name {
        println!("  {} {}", "Name:".bold(), name);
    }
    println!("  {} {} bytes", "Size:".bold(), artifact.size);
    println!("  {} {}", "Type:".bold(), artifact.media_type);
    println!("  {} {}", "SHA-1:".bold(), artifact.sha1.dimmed());
    println!();

    let rows: Vec<VerdictRow> = report.verdicts.values().map(table_row).collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();

    let summary = report.summary();
    let infected = format!("{} infected", summary.infected);
    let infected = if summary.infected > 0 {
        infected.red().bold().to_string()
    } else {
        infected
    };
    println!(
        "{} {}, {} clean, {} inconclusive ({} engines, {} ms)",
        "Summary:".bold(),
        infected,
        summary.clean,
        summary.inconclusive,
        summary.engines,
        report.duration_ms()
    );
}
