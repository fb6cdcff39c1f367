//! Output formatting utilities

use crate::OutputFormat;
use console::style;
use serde::Serialize;
use steadyget_core::{RunSummary, Verdict};
use steadyget_types::{DownloadOutcome, TransferStatus};

/// Print output in the specified format
pub fn print_output<T: Serialize + std::fmt::Display>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Human | OutputFormat::Table => {
            println!("{}", value);
        }
    }
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a RunSummary,
    outcomes: Vec<LabeledOutcome<'a>>,
}

#[derive(Serialize)]
struct LabeledOutcome<'a> {
    label: &'a str,
    #[serde(flatten)]
    outcome: &'a DownloadOutcome,
}

/// Print per-task results and the summary. Returns true when every task
/// succeeded.
pub fn print_report(
    labels: &[String],
    outcomes: &[DownloadOutcome],
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let summary = RunSummary::from_outcomes(outcomes);

    match format {
        OutputFormat::Json => {
            let report = Report {
                summary: &summary,
                outcomes: labels
                    .iter()
                    .zip(outcomes)
                    .map(|(label, outcome)| LabeledOutcome { label, outcome })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct OutcomeRow {
                task: usize,
                label: String,
                status: String,
                message: String,
            }

            let rows: Vec<OutcomeRow> = labels
                .iter()
                .zip(outcomes)
                .map(|(label, outcome)| OutcomeRow {
                    task: outcome.task_id,
                    label: label.clone(),
                    status: format!("{:?}", outcome.status),
                    message: outcome.message.clone(),
                })
                .collect();

            println!("{}", Table::new(rows));
            println!("{}", summary);
        }
        OutputFormat::Human => {
            // Failures and skipped tasks only; the summary line counts successes
            for (label, outcome) in labels.iter().zip(outcomes) {
                if outcome.success {
                    continue;
                }
                let icon = match outcome.status {
                    TransferStatus::Idle => style("○").dim(),
                    _ => style("✗").red(),
                };
                println!(
                    "{} {} {}",
                    icon,
                    style(label).bold(),
                    style(&outcome.message).dim()
                );
            }

            let line = summary.to_string();
            if summary.is_success() {
                println!("{} {}", style("✓").green().bold(), line);
            } else {
                println!("{} {}", style("✗").red().bold(), style(line).red());
            }
            match summary.verdict() {
                Verdict::AllFailed => println!(
                    "{}",
                    style("Every task failed; check the network connection and proxy settings").yellow()
                ),
                Verdict::Cancelled => println!(
                    "{}",
                    style("Interrupted; run again to fetch the remaining tasks").yellow()
                ),
                _ => {}
            }
        }
    }

    Ok(summary.is_success())
}
