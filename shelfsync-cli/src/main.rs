//! shelfsync — mirror subscribed works into a local library.
//!
//! # Usage
//!
//! ```text
//! shelfsync init [--books-directory <dir>] [--format epub|azw3|mobi|pdf|html] [--interval-secs <n>]
//! shelfsync sync [--verbose]
//! shelfsync daemon
//! shelfsync status [--json]
//! ```

mod commands;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonArgs, init::InitArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "shelfsync",
    version,
    about = "Keep a local mirror of your subscribed works",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.shelfsync/config.yaml.
    Init(InitArgs),

    /// Run one sync immediately. The daemon schedule is left untouched.
    Sync(SyncArgs),

    /// Run the scheduler loop in the foreground.
    Daemon(DaemonArgs),

    /// Show the next scheduled run and the state of the library directory.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Daemon(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
