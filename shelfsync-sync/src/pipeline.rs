//! Sync orchestrator shared by the CLI and the daemon.
//!
//! Per subscription, in listing order:
//! 1. Fetch work metadata (failure → `Failed`, continue).
//! 2. Restricted → `SkippedRestricted`, no export attempted.
//! 3. Build `{author}_{title}.{ext}` from sanitized names.
//! 4. Ask the staleness oracle; current → `SkippedUpToDate`.
//! 5. Replace-with-download; record `Downloaded` or `Failed`.
//!
//! Every per-item error ends as an [`ItemOutcome`]; only failing to list the
//! subscriptions or to create the target directory aborts a run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use shelfsync_core::{
    ArchiveInspector, ExportFormat, RemoteLibrary, Subscription, UnreadableArchivePolicy,
};

use crate::error::{io_err, SyncError};
use crate::outcome::{FailureReason, ItemOutcome, ItemStatus, RunReport};
use crate::staleness::{self, Freshness};
use crate::writer::{self, WriteResult};

/// Characters stripped from names because some common filesystem rejects them.
pub const UNSAFE_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Collaborators and settings for one run.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub remote: &'a dyn RemoteLibrary,
    pub inspector: &'a dyn ArchiveInspector,
    pub target_dir: &'a Path,
    pub format: ExportFormat,
    pub unreadable_archive: UnreadableArchivePolicy,
}

/// List the session's subscriptions and mirror each of them.
///
/// This is the canonical sync entrypoint for both `shelfsync sync` and the
/// daemon's scheduled runs.
pub fn run(ctx: &SyncContext<'_>, cancel: &AtomicBool) -> Result<RunReport, SyncError> {
    run_with(ctx, cancel, &mut |_| {})
}

/// [`run`], calling `observer` with each outcome as soon as it is known.
pub fn run_with(
    ctx: &SyncContext<'_>,
    cancel: &AtomicBool,
    observer: &mut dyn FnMut(&ItemOutcome),
) -> Result<RunReport, SyncError> {
    let subscriptions = ctx.remote.subscriptions()?;
    tracing::info!("{} subscription(s) listed", subscriptions.len());
    sync_subscriptions(ctx, &subscriptions, cancel, observer)
}

/// Mirror `subscriptions` into `ctx.target_dir`.
///
/// `cancel` is checked between items; once set, the run stops after the
/// current item and the report is marked cancelled.
pub fn sync_subscriptions(
    ctx: &SyncContext<'_>,
    subscriptions: &[Subscription],
    cancel: &AtomicBool,
    observer: &mut dyn FnMut(&ItemOutcome),
) -> Result<RunReport, SyncError> {
    let started_at = Utc::now();
    std::fs::create_dir_all(ctx.target_dir).map_err(|e| io_err(ctx.target_dir, e))?;

    let mut outcomes = Vec::with_capacity(subscriptions.len());
    let mut cancelled = false;
    for subscription in subscriptions {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(
                "cancellation requested; {} item(s) left unprocessed",
                subscriptions.len() - outcomes.len()
            );
            cancelled = true;
            break;
        }
        let outcome = sync_item(ctx, subscription);
        log_outcome(&outcome);
        observer(&outcome);
        outcomes.push(outcome);
    }

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
        cancelled,
    })
}

/// `{sanitized_author}_{sanitized_title}.{ext}`
pub fn archive_file_name(author: &str, title: &str, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        sanitize_file_name(author),
        sanitize_file_name(title),
        format.extension()
    )
}

/// Strip [`UNSAFE_FILENAME_CHARS`] from `name`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c))
        .collect()
}

fn sync_item(ctx: &SyncContext<'_>, subscription: &Subscription) -> ItemOutcome {
    let work = match ctx.remote.work(&subscription.id) {
        Ok(work) => work,
        Err(err) => {
            return ItemOutcome::new(
                subscription,
                ItemStatus::Failed {
                    reason: FailureReason::Metadata(err.to_string()),
                },
            )
        }
    };

    if work.restricted {
        return ItemOutcome::new(subscription, ItemStatus::SkippedRestricted);
    }

    let file_name = archive_file_name(
        subscription.primary_author(),
        &subscription.title,
        ctx.format,
    );
    let path = ctx.target_dir.join(file_name);

    let freshness = staleness::check(&work, &path, ctx.format, ctx.inspector);
    let warning = match &freshness {
        Freshness::Indeterminate { .. } => Some(freshness.describe()),
        _ => None,
    };
    if let Some(warning) = &warning {
        tracing::warn!(
            "{}: {} (policy: {})",
            path.display(),
            warning,
            ctx.unreadable_archive
        );
    }

    if !freshness.needs_refresh(ctx.unreadable_archive) {
        let mut outcome = ItemOutcome::new(subscription, ItemStatus::SkippedUpToDate);
        outcome.warning = warning;
        return outcome;
    }
    tracing::debug!("refreshing {}: {}", path.display(), freshness.describe());

    let status = match writer::replace_with_download(&path, |staging| {
        ctx.remote.export(&work.id, ctx.format, staging)
    }) {
        Ok(WriteResult::Written { path, bytes }) => ItemStatus::Downloaded { path, bytes },
        Ok(WriteResult::Empty { .. }) => ItemStatus::Failed {
            reason: FailureReason::EmptyDownload,
        },
        Err(SyncError::Remote(err)) => ItemStatus::Failed {
            reason: FailureReason::Download(err.to_string()),
        },
        Err(err) => ItemStatus::Failed {
            reason: FailureReason::Io(err.to_string()),
        },
    };

    let mut outcome = ItemOutcome::new(subscription, status);
    outcome.warning = warning;
    outcome
}

fn log_outcome(outcome: &ItemOutcome) {
    let who = format!("{} - {} ({})", outcome.author, outcome.title, outcome.id);
    match &outcome.status {
        ItemStatus::Downloaded { bytes, .. } => tracing::info!("{who}: downloaded {bytes} bytes"),
        ItemStatus::SkippedUpToDate => tracing::info!("{who}: up to date"),
        ItemStatus::SkippedRestricted => tracing::info!("{who}: restricted, skipped"),
        ItemStatus::Failed { reason } => tracing::error!("{who}: failed: {reason}"),
    }
}
