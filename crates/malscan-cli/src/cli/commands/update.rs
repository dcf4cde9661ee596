//! `malscan update` - Check for or install new signature definitions.

use anyhow::Result;
use colored::Colorize;
use malscan_core::UpdateOutcome;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::UpdateArgs;
use crate::output::print_structured;

#[derive(Tabled)]
struct UpdateRow {
    #[tabled(rename = "Engine")]
    engine: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// One engine's result, shared by every output format.
#[derive(Serialize)]
struct UpdateRecord {
    engine: String,
    status: &'static str,
    detail: Option<String>,
}

pub async fn execute(ctx: Context, args: UpdateArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator(&ctx.config.scan, &args.engines)?;

    let records: Vec<UpdateRecord> = if args.check {
        orchestrator
            .check_updates()
            .await
            .into_iter()
            .map(|(engine, result)| match result {
                Ok(true) => UpdateRecord { engine, status: "update_available", detail: None },
                Ok(false) => UpdateRecord { engine, status: "up_to_date", detail: None },
                Err(e) => UpdateRecord { engine, status: "error", detail: Some(e.to_string()) },
            })
            .collect()
    } else {
        orchestrator
            .update_all()
            .await
            .into_iter()
            .map(|(engine, result)| match result {
                Ok(UpdateOutcome::Updated) => {
                    UpdateRecord { engine, status: "updated", detail: None }
                }
                Ok(UpdateOutcome::AlreadyUpToDate) => {
                    UpdateRecord { engine, status: "up_to_date", detail: None }
                }
                Ok(UpdateOutcome::UpdateFailed(reason)) => {
                    UpdateRecord { engine, status: "update_failed", detail: Some(reason) }
                }
                Err(e) => UpdateRecord { engine, status: "error", detail: Some(e.to_string()) },
            })
            .collect()
    };

    if !print_structured(ctx.output_format, &records, &records)? {
        print_records_pretty(&records);
    }

    Ok(())
}

fn print_records_pretty(records: &[UpdateRecord]) {
    let rows: Vec<UpdateRow> = records
        .iter()
        .map(|r| {
            let status = match r.status {
                "updated" => "updated".green().to_string(),
                "up_to_date" => "up to date".to_string(),
                "update_available" => "update available".cyan().to_string(),
                other => other.replace('_', " ").red().to_string(),
            };
            let status = match &r.detail {
                Some(detail) => format!("{status}: {detail}"),
                None => status,
            };
            UpdateRow { engine: r.engine.clone(), status }
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
}
