use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler, the schedule record and the run loop.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schedule record is unreadable or the deadline cannot be computed.
    #[error("schedule error: {0}")]
    Schedule(String),

    #[error("sync error: {0}")]
    Sync(#[from] shelfsync_sync::SyncError),

    #[error("task failure: {0}")]
    Task(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
