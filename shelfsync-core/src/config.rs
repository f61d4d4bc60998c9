//! YAML configuration with environment overrides.
//!
//! # Storage layout
//!
//! ```text
//! ~/.shelfsync/
//!   config.yaml   (mode 0600 — may hold the remote password)
//!   next_run      (schedule record, owned by shelfsync-daemon)
//! ```
//!
//! # API pattern
//!
//! Every function touching the home directory has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Resolution order: built-in defaults → `config.yaml` → environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ExportFormat, UnreadableArchivePolicy};

pub const DEFAULT_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7878";

const ENV_BOOKS_DIRECTORY: &str = "SHELFSYNC_BOOKS_DIRECTORY";
const ENV_LEGACY_BOOKS_DIRECTORY: &str = "BOOKS_DIRECTORY";
const ENV_FORMAT: &str = "SHELFSYNC_FORMAT";
const ENV_INTERVAL_SECS: &str = "SHELFSYNC_INTERVAL_SECS";
const ENV_BASE_URL: &str = "SHELFSYNC_BASE_URL";
const ENV_USERNAME: &str = "SHELFSYNC_USERNAME";
const ENV_PASSWORD: &str = "SHELFSYNC_PASSWORD";
const ENV_UNREADABLE_ARCHIVE: &str = "SHELFSYNC_UNREADABLE_ARCHIVE";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Connection settings for the remote archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password: None,
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the archives are mirrored into; created on demand.
    pub books_directory: PathBuf,
    pub format: ExportFormat,
    /// Period between scheduled runs.
    pub interval_secs: u64,
    /// Overrides `~/.shelfsync/next_run`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_file: Option<PathBuf>,
    pub unreadable_archive: UnreadableArchivePolicy,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            books_directory: PathBuf::from(".").join("books"),
            format: ExportFormat::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            schedule_file: None,
            unreadable_archive: UnreadableArchivePolicy::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Path of the schedule record for this configuration.
    pub fn schedule_path_at(&self, home: &Path) -> PathBuf {
        self.schedule_file
            .clone()
            .unwrap_or_else(|| default_schedule_path_at(home))
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let books_directory =
            non_empty(ENV_BOOKS_DIRECTORY).or_else(|| non_empty(ENV_LEGACY_BOOKS_DIRECTORY));
        if let Some(dir) = books_directory {
            self.books_directory = PathBuf::from(dir);
        }
        if let Some(format) = non_empty(ENV_FORMAT) {
            self.format = format.parse().map_err(|reason| ConfigError::Invalid {
                key: ENV_FORMAT,
                reason,
            })?;
        }
        if let Some(secs) = non_empty(ENV_INTERVAL_SECS) {
            self.interval_secs = secs.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_INTERVAL_SECS,
                reason: format!("'{secs}' is not a whole number of seconds: {e}"),
            })?;
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.remote.base_url = url;
        }
        if let Some(username) = non_empty(ENV_USERNAME) {
            self.remote.username = Some(username);
        }
        if let Some(password) = non_empty(ENV_PASSWORD) {
            self.remote.password = Some(password);
        }
        if let Some(policy) = non_empty(ENV_UNREADABLE_ARCHIVE) {
            self.unreadable_archive = policy.parse().map_err(|reason| ConfigError::Invalid {
                key: ENV_UNREADABLE_ARCHIVE,
                reason,
            })?;
        }
        Ok(())
    }

    /// Reject values the scheduler and remote client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "remote.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.shelfsync/`
pub fn shelfsync_root(home: &Path) -> PathBuf {
    home.join(".shelfsync")
}

/// `<home>/.shelfsync/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    shelfsync_root(home).join("config.yaml")
}

/// `<home>/.shelfsync/next_run` — pure, no I/O.
pub fn default_schedule_path_at(home: &Path) -> PathBuf {
    shelfsync_root(home).join("next_run")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `config.yaml`, or defaults when it does not exist.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Load the file, apply process environment overrides, and validate.
pub fn resolve_at(home: &Path) -> Result<Config, ConfigError> {
    let mut config = load_at(home)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// `resolve_at` convenience wrapper.
pub fn resolve() -> Result<Config, ConfigError> {
    resolve_at(&home()?)
}

/// Atomically save `config.yaml`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let root = shelfsync_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
