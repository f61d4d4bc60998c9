//! `shelfsync daemon` — foreground scheduler loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use shelfsync_core::RemoteLibrary;
use shelfsync_daemon::{start_blocking, Session, Termination};
use shelfsync_remote::HttpLibrary;

/// Arguments for `shelfsync daemon`.
#[derive(Args, Debug)]
pub struct DaemonArgs {}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = super::load_config()?;
        let credentials = config.remote.clone();
        let session = Session::new(move || {
            let library = HttpLibrary::login(&credentials)?;
            Ok(Arc::new(library) as Arc<dyn RemoteLibrary>)
        });
        // Bad credentials stop the daemon here; later expiries log in again.
        session
            .connect()
            .with_context(|| format!("failed to log in to {}", config.remote.base_url))?;

        let termination = start_blocking(&home, &config, Arc::new(session))
            .context("daemon exited with error")?;

        if let Termination::Signal(_) = termination {
            println!("{}", "Exiting...".magenta().bold());
            std::process::exit(termination.exit_code());
        }
        Ok(())
    }
}
