//! Persistent scheduler and the long-running sync loop.

mod error;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use runtime::{drive, init_tracing, run, start_blocking, Session, SyncJob, Termination};
pub use scheduler::{
    Clock, Decision, FileScheduleStore, MemoryScheduleStore, RunReason, ScheduleStore, Scheduler,
    SystemClock,
};
