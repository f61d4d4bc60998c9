//! `shelfsync status` — schedule and library visibility.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use shelfsync_core::{config, Config, ExportFormat};
use shelfsync_daemon::{FileScheduleStore, ScheduleStore};
use shelfsync_sync::writer::leftover_staging_files;

/// Arguments for `shelfsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = super::load_config()?;
        let report = build_report(&home, &config, Utc::now())?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    config_file: PathBuf,
    books_directory: PathBuf,
    format: ExportFormat,
    interval_secs: u64,
    schedule_file: PathBuf,
    next_run_at: Option<DateTime<Utc>>,
    next_run: String,
    archives: usize,
    staging_leftovers: Vec<PathBuf>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "setting")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(home: &Path, config: &Config, now: DateTime<Utc>) -> Result<StatusReport> {
    let schedule_file = config.schedule_path_at(home);
    let next_run_at = FileScheduleStore::new(&schedule_file)
        .load()
        .with_context(|| format!("failed to read schedule {}", schedule_file.display()))?;
    let archives = count_archives(&config.books_directory, config.format)?;
    let staging_leftovers = leftover_staging_files(&config.books_directory).with_context(|| {
        format!(
            "failed to scan {} for staging files",
            config.books_directory.display()
        )
    })?;

    Ok(StatusReport {
        config_file: config::config_path_at(home),
        books_directory: config.books_directory.clone(),
        format: config.format,
        interval_secs: config.interval_secs,
        schedule_file,
        next_run: describe_next_run(next_run_at, now),
        next_run_at,
        archives,
        staging_leftovers,
    })
}

fn count_archives(dir: &Path, format: ExportFormat) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err).with_context(|| format!("cannot read {}", dir.display())),
    };
    let mut count = 0;
    for entry in entries {
        let path = entry
            .with_context(|| format!("cannot read {}", dir.display()))?
            .path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(format.extension()))
            .unwrap_or(false);
        if matches && path.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

fn describe_next_run(next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(next) = next else {
        return "never scheduled (runs on first daemon start)".to_string();
    };
    let remaining = next - now;
    if remaining.num_seconds() <= 0 {
        return "due (runs on next daemon start)".to_string();
    }
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("in {hours}h {minutes}m")
    } else if minutes > 0 {
        format!("in {minutes}m")
    } else {
        format!("in {}s", remaining.num_seconds())
    }
}

fn print_table(report: &StatusReport) {
    println!("shelfsync v{}", env!("CARGO_PKG_VERSION"));

    let next_run = match report.next_run_at {
        Some(at) => format!("{} ({})", at.format("%Y-%m-%d %H:%M:%S UTC"), report.next_run),
        None => report.next_run.clone(),
    };
    let rows = vec![
        StatusRow {
            key: "config",
            value: report.config_file.display().to_string(),
        },
        StatusRow {
            key: "books directory",
            value: report.books_directory.display().to_string(),
        },
        StatusRow {
            key: "format",
            value: report.format.to_string(),
        },
        StatusRow {
            key: "interval",
            value: format!("{}s", report.interval_secs),
        },
        StatusRow {
            key: "next run",
            value: next_run,
        },
        StatusRow {
            key: "archives",
            value: report.archives.to_string(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !report.staging_leftovers.is_empty() {
        println!(
            "{}",
            format!(
                "{} leftover staging file(s); they are removed on the next sync:",
                report.staging_leftovers.len()
            )
            .yellow()
        );
        for path in &report.staging_leftovers {
            println!("  {}", path.display());
        }
    }
}
