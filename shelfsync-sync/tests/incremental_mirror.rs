use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use filetime::{set_file_mtime, FileTime};
use shelfsync_core::{
    ExportFormat, RemoteError, RemoteLibrary, Subscription, UnreadableArchivePolicy, Work, WorkId,
};
use shelfsync_sync::{pipeline, EpubInspector, ItemStatus, SyncContext};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Remote exporting real EPUB containers with `chapters + 3` spine entries.
struct ArchiveRemote {
    works: Vec<Work>,
    exports: Mutex<Vec<WorkId>>,
}

impl ArchiveRemote {
    fn new(works: Vec<Work>) -> Self {
        Self {
            works,
            exports: Mutex::new(Vec::new()),
        }
    }

    fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }
}

impl RemoteLibrary for ArchiveRemote {
    fn subscriptions(&self) -> Result<Vec<Subscription>, RemoteError> {
        Ok(self
            .works
            .iter()
            .map(|w| Subscription {
                id: w.id.clone(),
                authors: w.authors.clone(),
                title: w.title.clone(),
            })
            .collect())
    }

    fn work(&self, id: &WorkId) -> Result<Work, RemoteError> {
        self.works
            .iter()
            .find(|w| &w.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.clone()))
    }

    fn export(&self, id: &WorkId, _format: ExportFormat, dest: &Path) -> Result<(), RemoteError> {
        self.exports.lock().unwrap().push(id.clone());
        let work = self.work(id)?;
        write_epub(dest, work.chapters as usize + 3);
        Ok(())
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn long_title(restricted: bool) -> Work {
    Work {
        id: WorkId::from("48213"),
        authors: vec!["nx".into()],
        title: "Long:Title?".into(),
        restricted,
        updated_at: t0(),
        chapters: 5,
    }
}

fn write_epub(path: &Path, spine_len: usize) {
    let refs: String = (0..spine_len)
        .map(|i| format!("<itemref idref=\"c{i}\"/>"))
        .collect();
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(br#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#)
        .unwrap();
    zip.start_file("content.opf", options).unwrap();
    zip.write_all(format!("<package><spine>{refs}</spine></package>").as_bytes())
        .unwrap();
    zip.finish().unwrap();
}

fn local_archive(dir: &Path, spine_len: usize) -> PathBuf {
    let path = dir.join("nx_LongTitle.epub");
    write_epub(&path, spine_len);
    let newer = SystemTime::from(t0()) + Duration::from_secs(3600);
    set_file_mtime(&path, FileTime::from_system_time(newer)).unwrap();
    path
}

fn mirror(remote: &ArchiveRemote, dir: &Path) -> shelfsync_sync::RunReport {
    let ctx = SyncContext {
        remote,
        inspector: &EpubInspector,
        target_dir: dir,
        format: ExportFormat::Epub,
        unreadable_archive: UnreadableArchivePolicy::Keep,
    };
    pipeline::run(&ctx, &AtomicBool::new(false)).expect("run")
}

#[test]
fn fresh_mirror_downloads_under_sanitized_name() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let remote = ArchiveRemote::new(vec![long_title(false)]);

    let report = mirror(&remote, dir.path());

    assert!(matches!(report.outcomes[0].status, ItemStatus::Downloaded { .. }));
    let path = dir.path().join("nx_LongTitle.epub");
    assert!(path.exists());
    assert!(!dir.path().join("nx_LongTitle.epub.tmp").exists());
}

#[test]
fn seven_local_sections_for_five_chapters_is_refreshed() {
    init_logging();
    let dir = TempDir::new().unwrap();
    local_archive(dir.path(), 7);
    let remote = ArchiveRemote::new(vec![long_title(false)]);

    let report = mirror(&remote, dir.path());

    assert!(matches!(report.outcomes[0].status, ItemStatus::Downloaded { .. }));
    assert_eq!(remote.export_count(), 1);
}

#[test]
fn eight_local_sections_for_five_chapters_is_up_to_date() {
    init_logging();
    let dir = TempDir::new().unwrap();
    local_archive(dir.path(), 8);
    let remote = ArchiveRemote::new(vec![long_title(false)]);

    let report = mirror(&remote, dir.path());

    assert_eq!(report.outcomes[0].status, ItemStatus::SkippedUpToDate);
    assert_eq!(remote.export_count(), 0);
}

#[test]
fn second_run_after_download_is_up_to_date() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let remote = ArchiveRemote::new(vec![long_title(false)]);

    mirror(&remote, dir.path());
    let second = mirror(&remote, dir.path());

    assert_eq!(second.outcomes[0].status, ItemStatus::SkippedUpToDate);
    assert_eq!(remote.export_count(), 1);
}

#[test]
fn restricted_work_writes_nothing() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let remote = ArchiveRemote::new(vec![long_title(true)]);

    let report = mirror(&remote, dir.path());

    assert_eq!(report.outcomes[0].status, ItemStatus::SkippedRestricted);
    assert_eq!(remote.export_count(), 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn corrupt_local_archive_is_reported_as_warning_not_failure() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nx_LongTitle.epub");
    fs::write(&path, "truncated").unwrap();
    let newer = SystemTime::from(t0()) + Duration::from_secs(3600);
    set_file_mtime(&path, FileTime::from_system_time(newer)).unwrap();
    let remote = ArchiveRemote::new(vec![long_title(false)]);

    let report = mirror(&remote, dir.path());

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::SkippedUpToDate);
    assert!(outcome.warning.is_some());
    assert_eq!(report.summary().failed, 0);
}
