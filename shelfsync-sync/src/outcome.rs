//! Per-item outcomes and the aggregated run report.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use shelfsync_core::{Subscription, WorkId};

/// Why an item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FailureReason {
    /// Fetching the work's metadata failed.
    Metadata(String),
    /// The export call failed.
    Download(String),
    /// The export completed without producing any bytes.
    EmptyDownload,
    /// Local filesystem error while staging or promoting the file.
    Io(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Metadata(detail) => write!(f, "metadata: {detail}"),
            FailureReason::Download(detail) => write!(f, "download: {detail}"),
            FailureReason::EmptyDownload => write!(f, "empty file"),
            FailureReason::Io(detail) => write!(f, "i/o: {detail}"),
        }
    }
}

/// Exactly one of these is recorded per subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ItemStatus {
    Downloaded { path: PathBuf, bytes: u64 },
    SkippedUpToDate,
    SkippedRestricted,
    Failed { reason: FailureReason },
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Downloaded { .. } => "downloaded",
            ItemStatus::SkippedUpToDate => "skipped-up-to-date",
            ItemStatus::SkippedRestricted => "skipped-restricted",
            ItemStatus::Failed { .. } => "failed",
        }
    }
}

/// Outcome for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub id: WorkId,
    pub author: String,
    pub title: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    /// Set when the local archive could not be inspected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ItemOutcome {
    pub(crate) fn new(subscription: &Subscription, status: ItemStatus) -> Self {
        Self {
            id: subscription.id.clone(),
            author: subscription.primary_author().to_string(),
            title: subscription.title.clone(),
            status,
            warning: None,
        }
    }
}

/// Counts per outcome for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub downloaded: usize,
    pub up_to_date: usize,
    pub restricted: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.downloaded + self.up_to_date + self.restricted + self.failed
    }
}

/// Everything one orchestrator run did, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ItemOutcome>,
    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                ItemStatus::Downloaded { .. } => summary.downloaded += 1,
                ItemStatus::SkippedUpToDate => summary.up_to_date += 1,
                ItemStatus::SkippedRestricted => summary.restricted += 1,
                ItemStatus::Failed { .. } => summary.failed += 1,
            }
            if outcome.warning.is_some() {
                summary.warnings += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: ItemStatus, warning: Option<&str>) -> ItemOutcome {
        let sub = Subscription {
            id: WorkId::from("7"),
            authors: vec!["nx".into()],
            title: "t".into(),
        };
        let mut outcome = ItemOutcome::new(&sub, status);
        outcome.warning = warning.map(str::to_string);
        outcome
    }

    #[test]
    fn summary_counts_each_status_once() {
        let now = Utc::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            outcomes: vec![
                outcome(
                    ItemStatus::Downloaded {
                        path: PathBuf::from("nx_t.epub"),
                        bytes: 10,
                    },
                    None,
                ),
                outcome(ItemStatus::SkippedUpToDate, Some("cannot read local copy")),
                outcome(ItemStatus::SkippedRestricted, None),
                outcome(
                    ItemStatus::Failed {
                        reason: FailureReason::EmptyDownload,
                    },
                    None,
                ),
            ],
            cancelled: false,
        };
        let summary = report.summary();
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.up_to_date, 1);
        assert_eq!(summary.restricted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn outcome_serializes_with_flat_status_tag() {
        let json = serde_json::to_value(outcome(
            ItemStatus::Failed {
                reason: FailureReason::Metadata("timeout".into()),
            },
            None,
        ))
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"]["kind"], "metadata");
        assert_eq!(json["reason"]["detail"], "timeout");
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn failure_reason_display_is_short() {
        assert_eq!(FailureReason::EmptyDownload.to_string(), "empty file");
        assert_eq!(
            FailureReason::Download("503".into()).to_string(),
            "download: 503"
        );
    }
}
