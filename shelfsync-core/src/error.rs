//! Error types for shelfsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::WorkId;

/// Errors from loading, validating, or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override or config value is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors reported by a [`crate::RemoteLibrary`] implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Login rejected or session no longer valid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service answered with a non-success status.
    #[error("remote returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("work {0} not found")]
    NotFound(WorkId),

    /// Connection, TLS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by an [`crate::ArchiveInspector`].
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a well-formed archive.
    #[error("malformed archive {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}
