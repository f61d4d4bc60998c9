//! # shelfsync-sync
//!
//! Incremental mirror engine: staleness oracle, atomic replace-with-download,
//! and the per-item fault-isolating orchestrator.
//!
//! Call [`pipeline::run`] to list the subscriptions of a remote session and
//! mirror them, or [`pipeline::sync_subscriptions`] when the listing is
//! already in hand.

pub mod epub;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod staleness;
pub mod writer;

pub use epub::EpubInspector;
pub use error::SyncError;
pub use outcome::{FailureReason, ItemOutcome, ItemStatus, RunReport, RunSummary};
pub use pipeline::{archive_file_name, sanitize_file_name, SyncContext};
pub use staleness::Freshness;
pub use writer::{replace_with_download, WriteResult};
