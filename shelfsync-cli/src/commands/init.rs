//! `shelfsync init [--books-directory <dir>] [--format <fmt>] ...`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use shelfsync_core::{config, ExportFormat, UnreadableArchivePolicy};

/// Write the configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory the archives are mirrored into.
    #[arg(long, short = 'd', value_name = "DIR")]
    pub books_directory: Option<PathBuf>,

    /// Export format: epub | azw3 | mobi | pdf | html.
    #[arg(long, short = 'f', value_name = "FORMAT")]
    pub format: Option<ExportFormat>,

    /// Seconds between scheduled runs.
    #[arg(long, value_name = "SECS")]
    pub interval_secs: Option<u64>,

    /// What to do with a local archive that cannot be read: keep | refresh.
    #[arg(long, value_name = "POLICY")]
    pub unreadable_archive: Option<UnreadableArchivePolicy>,

    /// Base URL of the archive gateway.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Account name. The password is read from SHELFSYNC_PASSWORD or `.env`.
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let path = config::config_path_at(&home);
        if path.exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite",
                path.display()
            );
        }

        let mut cfg = config::Config::default();
        if let Some(dir) = self.books_directory {
            cfg.books_directory = dir;
        }
        if let Some(format) = self.format {
            cfg.format = format;
        }
        if let Some(secs) = self.interval_secs {
            cfg.interval_secs = secs;
        }
        if let Some(policy) = self.unreadable_archive {
            cfg.unreadable_archive = policy;
        }
        if let Some(url) = self.base_url {
            cfg.remote.base_url = url;
        }
        cfg.remote.username = self.username;
        cfg.validate().context("invalid configuration")?;

        let written = config::save_at(&home, &cfg)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("✓ Wrote {}", written.display());
        println!(
            "  Books: {} ({}, every {}s)",
            cfg.books_directory.display(),
            cfg.format,
            cfg.interval_secs
        );
        Ok(())
    }
}
