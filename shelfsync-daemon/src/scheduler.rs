//! Persistent wake-up schedule.
//!
//! The record holds the deadline of the next due run. Each [`Scheduler::tick`]
//! reads it and decides:
//!
//! - no record: commit `now + period`, run (first run)
//! - deadline <= now: commit `now + period`, run once however late it is
//! - deadline > now: wait exactly `deadline - now`
//!
//! The next deadline is committed before the run starts, so a crash mid-run
//! does not cause a second run on restart.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{io_err, DaemonError};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Durable storage for the next deadline.
pub trait ScheduleStore: Send + Sync {
    /// `None` when no run has ever been scheduled.
    fn load(&self) -> Result<Option<DateTime<Utc>>, DaemonError>;
    fn commit(&self, deadline: DateTime<Utc>) -> Result<(), DaemonError>;
}

/// Schedule record kept as one epoch-seconds number in a text file.
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileScheduleStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, DaemonError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(&self.path, err)),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_epoch_seconds(raw).map(Some).ok_or_else(|| {
            DaemonError::Schedule(format!(
                "{}: not an epoch-seconds value: {raw:?}",
                self.path.display()
            ))
        })
    }

    fn commit(&self, deadline: DateTime<Utc>) -> Result<(), DaemonError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format_epoch_seconds(deadline)).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
    }
}

/// In-process store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    deadline: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryScheduleStore {
    pub fn with_deadline(deadline: DateTime<Utc>) -> Self {
        Self {
            deadline: Mutex::new(Some(deadline)),
        }
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, DaemonError> {
        self.deadline
            .lock()
            .map(|guard| *guard)
            .map_err(|_| DaemonError::Schedule("schedule lock poisoned".to_string()))
    }

    fn commit(&self, deadline: DateTime<Utc>) -> Result<(), DaemonError> {
        let mut guard = self
            .deadline
            .lock()
            .map_err(|_| DaemonError::Schedule("schedule lock poisoned".to_string()))?;
        *guard = Some(deadline);
        Ok(())
    }
}

/// Why a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    FirstRun,
    /// The recorded deadline has passed, possibly while the process was down.
    Due { overdue: Duration },
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReason::FirstRun => write!(f, "first run"),
            RunReason::Due { overdue } if overdue.is_zero() => write!(f, "due"),
            RunReason::Due { overdue } => write!(f, "catch-up, {}s overdue", overdue.as_secs()),
        }
    }
}

/// Outcome of one [`Scheduler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run now. `next_deadline` is already committed.
    RunNow {
        reason: RunReason,
        next_deadline: DateTime<Utc>,
    },
    /// Sleep for `delay`, then tick again.
    Wait {
        delay: Duration,
        deadline: DateTime<Utc>,
    },
}

pub struct Scheduler<C, S> {
    clock: C,
    store: S,
    period: TimeDelta,
}

impl<C: Clock, S: ScheduleStore> Scheduler<C, S> {
    pub fn new(clock: C, store: S, period: Duration) -> Result<Self, DaemonError> {
        if period.is_zero() {
            return Err(DaemonError::Schedule("period must be positive".to_string()));
        }
        let period = TimeDelta::from_std(period)
            .map_err(|e| DaemonError::Schedule(format!("period out of range: {e}")))?;
        Ok(Self {
            clock,
            store,
            period,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide between running now and waiting. Commits before returning
    /// [`Decision::RunNow`].
    pub fn tick(&self) -> Result<Decision, DaemonError> {
        let now = self.clock.now();
        let recorded = self.store.load()?;

        if let Some(deadline) = recorded {
            if deadline > now {
                let delay = (deadline - now).to_std().unwrap_or_default();
                return Ok(Decision::Wait { delay, deadline });
            }
        }

        let next_deadline = now
            .checked_add_signed(self.period)
            .ok_or_else(|| DaemonError::Schedule(format!("{now} + period overflows")))?;
        self.store.commit(next_deadline)?;

        let reason = match recorded {
            None => RunReason::FirstRun,
            Some(deadline) => RunReason::Due {
                overdue: (now - deadline).to_std().unwrap_or_default(),
            },
        };
        Ok(Decision::RunNow {
            reason,
            next_deadline,
        })
    }
}

fn parse_epoch_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos)
}

fn format_epoch_seconds(deadline: DateTime<Utc>) -> String {
    format!(
        "{}.{:06}",
        deadline.timestamp(),
        deadline.timestamp_subsec_micros()
    )
}
