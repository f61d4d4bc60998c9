//! shelfsync core library — domain types, collaborator traits, config, errors.
//!
//! Public API surface:
//! - [`types`] — works, subscriptions, export formats
//! - [`library`] — [`RemoteLibrary`] and [`ArchiveInspector`] seams
//! - [`config`] — load / save / env overrides
//! - [`error`] — [`ConfigError`], [`RemoteError`], [`ArchiveError`]

pub mod config;
pub mod error;
pub mod library;
pub mod types;

pub use config::{Config, RemoteConfig};
pub use error::{ArchiveError, ConfigError, RemoteError};
pub use library::{ArchiveInspector, RemoteLibrary};
pub use types::{
    ExportFormat, Subscription, UnreadableArchivePolicy, Work, WorkId, ANONYMOUS_AUTHOR,
    EPUB_FRAME_SECTIONS,
};
