//! Domain types for remote works and local archives.
//!
//! Works and subscriptions are snapshots fetched fresh on every run; nothing
//! here is persisted apart from [`crate::config::Config`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sections the EPUB exporter always adds around the chapters: title page,
/// table of contents, and cover page.
pub const EPUB_FRAME_SECTIONS: u32 = 3;

/// Author handle used when a work lists no author.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Remote identifier of a work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub String);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Single-file archive formats the remote exporter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Epub,
    Azw3,
    Mobi,
    Pdf,
    Html,
}

impl ExportFormat {
    /// Lowercase file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Epub => "epub",
            ExportFormat::Azw3 => "azw3",
            ExportFormat::Mobi => "mobi",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
        }
    }

    /// Number of generated non-chapter sections inside an exported archive,
    /// or `None` when the section structure of the format is not inspected.
    pub fn frame_sections(self) -> Option<u32> {
        match self {
            ExportFormat::Epub => Some(EPUB_FRAME_SECTIONS),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epub" => Ok(ExportFormat::Epub),
            "azw3" => Ok(ExportFormat::Azw3),
            "mobi" => Ok(ExportFormat::Mobi),
            "pdf" => Ok(ExportFormat::Pdf),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!(
                "unknown export format '{other}'; expected: epub, azw3, mobi, pdf, html"
            )),
        }
    }
}

/// What to do when a local archive exists but cannot be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnreadableArchivePolicy {
    /// Keep the local copy; avoids re-downloading on transient read errors.
    #[default]
    Keep,
    /// Re-download; a corrupt local file is never masked.
    Refresh,
}

impl fmt::Display for UnreadableArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnreadableArchivePolicy::Keep => write!(f, "keep"),
            UnreadableArchivePolicy::Refresh => write!(f, "refresh"),
        }
    }
}

impl FromStr for UnreadableArchivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(UnreadableArchivePolicy::Keep),
            "refresh" => Ok(UnreadableArchivePolicy::Refresh),
            other => Err(format!(
                "unknown unreadable-archive policy '{other}'; expected: keep, refresh"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One entry of the user's subscription listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: WorkId,
    #[serde(default)]
    pub authors: Vec<String>,
    pub title: String,
}

impl Subscription {
    pub fn primary_author(&self) -> &str {
        primary_author(&self.authors)
    }
}

/// Full metadata for a subscribed work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    #[serde(default)]
    pub authors: Vec<String>,
    pub title: String,
    /// Restricted works are only visible to logged-in members and are never
    /// exported.
    #[serde(default)]
    pub restricted: bool,
    pub updated_at: DateTime<Utc>,
    /// Number of chapters the remote currently publishes.
    pub chapters: u32,
}

impl Work {
    pub fn primary_author(&self) -> &str {
        primary_author(&self.authors)
    }
}

fn primary_author(authors: &[String]) -> &str {
    authors
        .first()
        .map(String::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or(ANONYMOUS_AUTHOR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
