//! Collaborator seams between the sync engine and the outside world.
//!
//! The engine never talks to the network or parses archive containers
//! itself; it goes through these two traits so tests can substitute
//! in-memory fakes.

use std::path::Path;

use crate::error::{ArchiveError, RemoteError};
use crate::types::{ExportFormat, Subscription, Work, WorkId};

/// An authenticated session against the remote archive.
pub trait RemoteLibrary: Send + Sync {
    /// List the works the user is subscribed to. Order is not stable.
    fn subscriptions(&self) -> Result<Vec<Subscription>, RemoteError>;

    /// Fetch current metadata for one work.
    fn work(&self, id: &WorkId) -> Result<Work, RemoteError>;

    /// Export the full work to `dest` in `format`.
    ///
    /// Implementations write only to `dest`; the caller owns promotion of
    /// the file to its final name.
    fn export(&self, id: &WorkId, format: ExportFormat, dest: &Path) -> Result<(), RemoteError>;
}

/// Reads the internal structure of a local archive file.
pub trait ArchiveInspector: Send + Sync {
    /// Number of reading-order sections in the archive at `path`.
    fn section_count(&self, path: &Path) -> Result<u32, ArchiveError>;
}
