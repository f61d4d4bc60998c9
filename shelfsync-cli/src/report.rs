//! Console presentation of sync outcomes.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use shelfsync_sync::{FailureReason, ItemOutcome, ItemStatus, RunReport};

const TITLE_WIDTH: usize = 80;

/// One coloured line per item: `{author} - {title}` padded, then the status.
pub fn outcome_line(outcome: &ItemOutcome) -> String {
    let title = format!("{} - {}", outcome.author, outcome.title);
    let title = format!("{title:<width$}", width = TITLE_WIDTH).cyan();
    let status = match &outcome.status {
        ItemStatus::Downloaded { .. } => "DOWNLOADED".green().to_string(),
        ItemStatus::SkippedUpToDate => "SKIPPED - UP TO DATE".green().to_string(),
        ItemStatus::SkippedRestricted => "SKIPPED - RESTRICTED".yellow().to_string(),
        ItemStatus::Failed {
            reason: FailureReason::EmptyDownload,
        } => "FAILED - EMPTY FILE".red().to_string(),
        ItemStatus::Failed { reason } => {
            format!("{}\t\t{}", "FAILED".red(), reason.to_string().dimmed())
        }
    };
    format!("{title}\t{status}")
}

/// Warning line for an item whose local copy could not be read.
pub fn warning_line(outcome: &ItemOutcome) -> Option<String> {
    let warning = outcome.warning.as_ref()?;
    Some(format!(
        "{}\t\t{}",
        format!("Error reading existing file for {}", outcome.title).red(),
        warning.dimmed()
    ))
}

pub fn print_outcome(outcome: &ItemOutcome) {
    if let Some(line) = warning_line(outcome) {
        println!("{line}");
    }
    println!("{}", outcome_line(outcome));
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "downloaded")]
    downloaded: usize,
    #[tabled(rename = "up to date")]
    up_to_date: usize,
    #[tabled(rename = "restricted")]
    restricted: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "warnings")]
    warnings: usize,
}

pub fn print_summary(report: &RunReport) {
    let summary = report.summary();
    let mut table = Table::new([SummaryRow {
        downloaded: summary.downloaded,
        up_to_date: summary.up_to_date,
        restricted: summary.restricted,
        failed: summary.failed,
        warnings: summary.warnings,
    }]);
    table.with(Style::rounded());
    println!("{table}");

    if report.cancelled {
        println!("{}", "Sync cancelled before all items were processed.".yellow());
    } else {
        println!("{}", "Download complete!".magenta().bold());
    }
}
