//! `shelfsync sync` — one immediate mirror run.

use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;

use shelfsync_remote::HttpLibrary;
use shelfsync_sync::{pipeline, EpubInspector, SyncContext};

use crate::report;

/// Arguments for `shelfsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Also emit log records (filtered by RUST_LOG, default info).
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        if self.verbose {
            shelfsync_daemon::init_tracing();
        }
        let (_home, config) = super::load_config()?;

        let remote = HttpLibrary::login(&config.remote)
            .with_context(|| format!("failed to log in to {}", config.remote.base_url))?;
        let ctx = SyncContext {
            remote: &remote,
            inspector: &EpubInspector,
            target_dir: &config.books_directory,
            format: config.format,
            unreadable_archive: config.unreadable_archive,
        };

        let report = pipeline::run_with(&ctx, &AtomicBool::new(false), &mut report::print_outcome)
            .with_context(|| {
                format!(
                    "sync into '{}' failed",
                    config.books_directory.display()
                )
            })?;
        report::print_summary(&report);
        Ok(())
    }
}
