//! Atomic replace-with-download.
//!
//! ## `replace_with_download` — protocol
//!
//! 1. Remove a staging file left behind by a crashed attempt.
//! 2. Let the download function write `<path>.tmp`, never `<path>`.
//! 3. Empty staging file → remove it, report [`WriteResult::Empty`].
//! 4. Otherwise rename staging over the final path (atomic on POSIX).
//!
//! The staging file is owned by a guard for the whole call, so it is gone
//! when the function returns, whether through success, an error, or a panic
//! unwinding out of the download function.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// Suffix appended to the final path to build the staging path.
pub const STAGING_SUFFIX: &str = ".tmp";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of one replace-with-download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// The final path now holds a complete download of `bytes` bytes.
    Written { path: PathBuf, bytes: u64 },
    /// The download produced no bytes; the final path was left untouched.
    Empty { path: PathBuf },
}

/// `<final_path>.tmp`
pub fn staging_path(final_path: &Path) -> PathBuf {
    let mut raw: OsString = final_path.as_os_str().to_owned();
    raw.push(STAGING_SUFFIX);
    PathBuf::from(raw)
}

// ---------------------------------------------------------------------------
// replace_with_download
// ---------------------------------------------------------------------------

/// Download into a staging file and promote it to `final_path` only when
/// the download completed with content.
///
/// An error from `download` is returned unchanged (converted into
/// [`SyncError`]) after the staging file has been removed; `final_path` is
/// never modified in that case.
pub fn replace_with_download<F, E>(final_path: &Path, download: F) -> Result<WriteResult, SyncError>
where
    F: FnOnce(&Path) -> Result<(), E>,
    SyncError: From<E>,
{
    let staging = staging_path(final_path);

    // Step 1: leftovers from an interrupted run.
    remove_if_exists(&staging)?;

    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let guard = StagingGuard::new(&staging);

    // Step 2: the download writes only to the staging path.
    download(&staging)?;

    // Step 3: an empty (or never created) staging file is a failed download.
    let bytes = match std::fs::metadata(&staging) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == ErrorKind::NotFound => 0,
        Err(err) => return Err(io_err(&staging, err)),
    };
    if bytes == 0 {
        tracing::warn!("empty download discarded: {}", final_path.display());
        return Ok(WriteResult::Empty {
            path: final_path.to_path_buf(),
        });
    }

    // Step 4: promote.
    promote(&staging, final_path)?;
    guard.disarm();

    tracing::info!("wrote: {} ({} bytes)", final_path.display(), bytes);
    Ok(WriteResult::Written {
        path: final_path.to_path_buf(),
        bytes,
    })
}

/// Staging files directly inside `dir`, e.g. left by a killed process.
pub fn leftover_staging_files(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let is_staging = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(STAGING_SUFFIX))
            .unwrap_or(false);
        if is_staging && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Removes the staging file on drop unless disarmed after promotion.
struct StagingGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> StagingGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => tracing::debug!("removed staging file: {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                "could not remove staging file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("removed leftover staging file: {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(not(windows))]
fn promote(staging: &Path, final_path: &Path) -> Result<(), SyncError> {
    std::fs::rename(staging, final_path).map_err(|e| io_err(final_path, e))
}

// Windows refuses to rename over an existing file.
#[cfg(windows)]
fn promote(staging: &Path, final_path: &Path) -> Result<(), SyncError> {
    match std::fs::rename(staging, final_path) {
        Ok(()) => Ok(()),
        Err(_) if final_path.exists() => {
            std::fs::remove_file(final_path).map_err(|e| io_err(final_path, e))?;
            std::fs::rename(staging, final_path).map_err(|e| io_err(final_path, e))
        }
        Err(err) => Err(io_err(final_path, err)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
