//! Staleness oracle for local archive copies.
//!
//! Signal precedence (first match wins):
//! 1. `Missing` (no file at the local path)
//! 2. `OlderThanRemote` (local mtime earlier than the remote update time)
//! 3. `MissingChapters` (remote publishes more chapters than the local
//!    archive holds once the exporter's frame sections are discounted)
//! 4. `Current`
//!
//! Any failure to read the local file yields `Indeterminate`, which the
//! caller resolves through [`UnreadableArchivePolicy`].

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};

use shelfsync_core::{ArchiveInspector, ExportFormat, UnreadableArchivePolicy, Work};

/// Staleness classification for one local archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    OlderThanRemote {
        local_modified: DateTime<Utc>,
        remote_updated: DateTime<Utc>,
    },
    MissingChapters {
        /// Local section count minus frame sections; may be negative.
        local: i64,
        remote: u32,
    },
    Current,
    Indeterminate {
        reason: String,
    },
}

impl Freshness {
    /// Whether the archive should be downloaded again.
    pub fn needs_refresh(&self, policy: UnreadableArchivePolicy) -> bool {
        match self {
            Freshness::Missing
            | Freshness::OlderThanRemote { .. }
            | Freshness::MissingChapters { .. } => true,
            Freshness::Current => false,
            Freshness::Indeterminate { .. } => policy == UnreadableArchivePolicy::Refresh,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Freshness::Missing => "no local copy".to_string(),
            Freshness::OlderThanRemote {
                local_modified,
                remote_updated,
            } => format!(
                "local copy from {} predates remote update {}",
                local_modified.format("%Y-%m-%d %H:%M"),
                remote_updated.format("%Y-%m-%d %H:%M"),
            ),
            Freshness::MissingChapters { local, remote } => {
                format!("local copy has {local} of {remote} chapter(s)")
            }
            Freshness::Current => "up to date".to_string(),
            Freshness::Indeterminate { reason } => format!("cannot read local copy: {reason}"),
        }
    }
}

/// Classify the archive at `local_path` against the remote `work`.
///
/// Never fails: read errors on an existing file become
/// [`Freshness::Indeterminate`].
pub fn check(
    work: &Work,
    local_path: &Path,
    format: ExportFormat,
    inspector: &dyn ArchiveInspector,
) -> Freshness {
    let meta = match std::fs::metadata(local_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Freshness::Missing,
        Err(err) => {
            return Freshness::Indeterminate {
                reason: err.to_string(),
            }
        }
    };

    let local_modified: DateTime<Utc> = match meta.modified() {
        Ok(mtime) => mtime.into(),
        Err(err) => {
            return Freshness::Indeterminate {
                reason: format!("modification time unavailable: {err}"),
            }
        }
    };
    if local_modified < work.updated_at {
        return Freshness::OlderThanRemote {
            local_modified,
            remote_updated: work.updated_at,
        };
    }

    // Formats without a known section layout rely on the mtime check only.
    let Some(frame) = format.frame_sections() else {
        return Freshness::Current;
    };

    let sections = match inspector.section_count(local_path) {
        Ok(sections) => sections,
        Err(err) => {
            return Freshness::Indeterminate {
                reason: err.to_string(),
            }
        }
    };

    let local = comparable_chapters(sections, frame);
    if i64::from(work.chapters) > local {
        return Freshness::MissingChapters {
            local,
            remote: work.chapters,
        };
    }

    Freshness::Current
}

/// `check` reduced to a yes/no under `policy`.
pub fn needs_refresh(
    work: &Work,
    local_path: &Path,
    format: ExportFormat,
    inspector: &dyn ArchiveInspector,
    policy: UnreadableArchivePolicy,
) -> bool {
    check(work, local_path, format, inspector).needs_refresh(policy)
}

/// Chapter count comparable with the remote, after discounting the
/// exporter's generated frame sections.
pub fn comparable_chapters(sections: u32, frame_sections: u32) -> i64 {
    i64::from(sections) - i64::from(frame_sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    use chrono::TimeZone;
    use filetime::{set_file_mtime, FileTime};
    use rstest::rstest;
    use shelfsync_core::{ArchiveError, WorkId};
    use tempfile::TempDir;

    struct FixedSections(Option<u32>);

    impl ArchiveInspector for FixedSections {
        fn section_count(&self, path: &Path) -> Result<u32, ArchiveError> {
            self.0.ok_or_else(|| ArchiveError::Malformed {
                path: path.to_path_buf(),
                reason: "not a zip archive".into(),
            })
        }
    }

    fn work(updated_at: DateTime<Utc>, chapters: u32) -> Work {
        Work {
            id: WorkId::from("1"),
            authors: vec!["nx".into()],
            title: "Long:Title?".into(),
            restricted: false,
            updated_at,
            chapters,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn local_file(dir: &TempDir, mtime: DateTime<Utc>) -> std::path::PathBuf {
        let path = dir.path().join("nx_LongTitle.epub");
        fs::write(&path, "epub").unwrap();
        let system: SystemTime = mtime.into();
        set_file_mtime(&path, FileTime::from_system_time(system)).unwrap();
        path
    }

    #[test]
    fn missing_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.epub");
        let freshness = check(&work(t0(), 5), &path, ExportFormat::Epub, &FixedSections(Some(100)));
        assert_eq!(freshness, Freshness::Missing);
        assert!(freshness.needs_refresh(UnreadableArchivePolicy::Keep));
    }

    #[test]
    fn older_mtime_is_stale_regardless_of_sections() {
        let dir = TempDir::new().unwrap();
        let path = local_file(&dir, t0() - chrono::Duration::days(1));
        let freshness = check(&work(t0(), 1), &path, ExportFormat::Epub, &FixedSections(Some(100)));
        assert!(matches!(freshness, Freshness::OlderThanRemote { .. }), "got {freshness:?}");
    }

    #[test]
    fn equal_mtime_is_not_older() {
        let dir = TempDir::new().unwrap();
        let path = local_file(&dir, t0());
        let freshness = check(&work(t0(), 5), &path, ExportFormat::Epub, &FixedSections(Some(8)));
        assert_eq!(freshness, Freshness::Current);
    }

    #[rstest]
    #[case(7, 5, true)]
    #[case(8, 5, false)]
    #[case(9, 5, false)]
    #[case(3, 1, true)]
    #[case(2, 0, true)]
    #[case(3, 0, false)]
    fn newer_mtime_compares_chapters_after_frame(
        #[case] sections: u32,
        #[case] remote_chapters: u32,
        #[case] stale: bool,
    ) {
        let dir = TempDir::new().unwrap();
        let path = local_file(&dir, t0() + chrono::Duration::hours(1));
        let freshness = check(
            &work(t0(), remote_chapters),
            &path,
            ExportFormat::Epub,
            &FixedSections(Some(sections)),
        );
        assert_eq!(
            freshness.needs_refresh(UnreadableArchivePolicy::Keep),
            stale,
            "sections={sections} remote={remote_chapters} got {freshness:?}"
        );
    }

    #[test]
    fn unreadable_archive_is_indeterminate_and_follows_policy() {
        let dir = TempDir::new().unwrap();
        let path = local_file(&dir, t0() + chrono::Duration::hours(1));
        let freshness = check(&work(t0(), 5), &path, ExportFormat::Epub, &FixedSections(None));
        match &freshness {
            Freshness::Indeterminate { reason } => assert!(reason.contains("not a zip")),
            other => panic!("expected indeterminate, got {other:?}"),
        }
        assert!(!freshness.needs_refresh(UnreadableArchivePolicy::Keep));
        assert!(freshness.needs_refresh(UnreadableArchivePolicy::Refresh));
    }

    #[test]
    fn formats_without_frame_layout_skip_section_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nx_LongTitle.pdf");
        fs::write(&path, "pdf").unwrap();
        let future = SystemTime::now() + Duration::from_secs(60);
        set_file_mtime(&path, FileTime::from_system_time(future)).unwrap();

        let freshness = check(&work(t0(), 500), &path, ExportFormat::Pdf, &FixedSections(None));
        assert_eq!(freshness, Freshness::Current);
    }

    #[test]
    fn needs_refresh_answers_for_the_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("absent.epub");
        let keep = UnreadableArchivePolicy::Keep;
        assert!(needs_refresh(&work(t0(), 5), &absent, ExportFormat::Epub, &FixedSections(Some(8)), keep));

        let path = local_file(&dir, t0() + chrono::Duration::hours(1));
        assert!(needs_refresh(&work(t0(), 5), &path, ExportFormat::Epub, &FixedSections(Some(7)), keep));
        assert!(!needs_refresh(&work(t0(), 5), &path, ExportFormat::Epub, &FixedSections(Some(8)), keep));
        assert!(needs_refresh(
            &work(t0(), 5),
            &path,
            ExportFormat::Epub,
            &FixedSections(None),
            UnreadableArchivePolicy::Refresh
        ));
    }

    #[test]
    fn negative_comparable_count_is_kept_signed() {
        assert_eq!(comparable_chapters(1, 3), -2);
        assert_eq!(comparable_chapters(8, 3), 5);
    }

    #[test]
    fn describe_is_human_readable() {
        let text = Freshness::MissingChapters { local: 4, remote: 5 }.describe();
        assert_eq!(text, "local copy has 4 of 5 chapter(s)");
    }
}
