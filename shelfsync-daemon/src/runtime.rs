use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use shelfsync_core::{
    ArchiveInspector, Config, ExportFormat, RemoteError, RemoteLibrary, UnreadableArchivePolicy,
};
use shelfsync_sync::{pipeline, EpubInspector, RunReport, SyncContext, SyncError};

use crate::error::{io_err, DaemonError};
use crate::scheduler::{Clock, Decision, FileScheduleStore, ScheduleStore, Scheduler, SystemClock};

const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Shutdown requested without a signal (channel closed).
    Shutdown,
    Signal(i32),
}

impl Termination {
    /// `128 + signal` for signals, 0 otherwise.
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Shutdown => 0,
            Termination::Signal(signal) => 128 + signal,
        }
    }
}

type Connect = dyn Fn() -> Result<Arc<dyn RemoteLibrary>, RemoteError> + Send + Sync;

/// Logged-in remote library, re-established when the service rejects it.
pub struct Session {
    connect: Box<Connect>,
    current: Mutex<Option<Arc<dyn RemoteLibrary>>>,
}

impl Session {
    /// `connect` performs a fresh login each time it is called.
    pub fn new<F>(connect: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RemoteLibrary>, RemoteError> + Send + Sync + 'static,
    {
        Self {
            connect: Box::new(connect),
            current: Mutex::new(None),
        }
    }

    /// A session that always hands out `remote`.
    pub fn fixed(remote: Arc<dyn RemoteLibrary>) -> Self {
        let seed = remote.clone();
        Self {
            connect: Box::new(move || Ok(remote.clone())),
            current: Mutex::new(Some(seed)),
        }
    }

    /// Log in now, replacing any cached session.
    pub fn connect(&self) -> Result<Arc<dyn RemoteLibrary>, RemoteError> {
        let remote = (self.connect)()?;
        *self.slot() = Some(remote.clone());
        Ok(remote)
    }

    /// The cached session, logging in first when there is none.
    pub fn current(&self) -> Result<Arc<dyn RemoteLibrary>, RemoteError> {
        let cached = self.slot().clone();
        match cached {
            Some(remote) => Ok(remote),
            None => self.connect(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn RemoteLibrary>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settings for one sync cycle, owned so they can cross into the blocking pool.
#[derive(Clone)]
pub struct SyncJob {
    pub session: Arc<Session>,
    pub inspector: Arc<dyn ArchiveInspector>,
    pub target_dir: PathBuf,
    pub format: ExportFormat,
    pub unreadable_archive: UnreadableArchivePolicy,
}

impl SyncJob {
    pub fn from_config(config: &Config, session: Arc<Session>) -> Self {
        Self {
            session,
            inspector: Arc::new(EpubInspector),
            target_dir: config.books_directory.clone(),
            format: config.format,
            unreadable_archive: config.unreadable_archive,
        }
    }

    /// Run one orchestrator pass on the blocking pool.
    pub async fn run(&self, cancel: Arc<AtomicBool>) -> Result<RunReport, DaemonError> {
        let job = self.clone();
        tokio::task::spawn_blocking(move || job.run_blocking(&cancel))
            .await
            .map_err(|err| DaemonError::Task(format!("sync task join error: {err}")))?
            .map_err(DaemonError::from)
    }

    /// One pass with the cached session. A rejected session is replaced by a
    /// fresh login and the pass is retried once.
    fn run_blocking(&self, cancel: &AtomicBool) -> Result<RunReport, SyncError> {
        let remote = self.session.current()?;
        match self.run_pipeline(remote.as_ref(), cancel) {
            Err(SyncError::Remote(RemoteError::Auth(reason))) => {
                tracing::warn!(%reason, "session rejected; logging in again");
                let remote = self.session.connect()?;
                self.run_pipeline(remote.as_ref(), cancel)
            }
            other => other,
        }
    }

    fn run_pipeline(
        &self,
        remote: &dyn RemoteLibrary,
        cancel: &AtomicBool,
    ) -> Result<RunReport, SyncError> {
        let ctx = SyncContext {
            remote,
            inspector: self.inspector.as_ref(),
            target_dir: &self.target_dir,
            format: self.format,
            unreadable_archive: self.unreadable_archive,
        };
        pipeline::run(&ctx, cancel)
    }
}

/// Start the scheduler loop and block the current thread until a signal
/// stops it.
pub fn start_blocking(
    home: &Path,
    config: &Config,
    session: Arc<Session>,
) -> Result<Termination, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    let store = FileScheduleStore::new(config.schedule_path_at(home));
    let scheduler = Scheduler::new(SystemClock, store, config.interval())?;
    tracing::info!(
        schedule = %scheduler.store().path().display(),
        interval_secs = config.interval_secs,
        books = %config.books_directory.display(),
        "daemon started"
    );
    let job = SyncJob::from_config(config, session);

    let result = runtime.block_on(run(scheduler, job));
    // An item abandoned after a second signal may still be blocking a pool thread.
    runtime.shutdown_background();
    result
}

/// Run the scheduler loop with OS signal handling until SIGINT or SIGTERM.
pub async fn run<C, S>(scheduler: Scheduler<C, S>, job: SyncJob) -> Result<Termination, DaemonError>
where
    C: Clock,
    S: ScheduleStore,
{
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<Termination>(4);

    let signal_handle = tokio::spawn(forward_signals(shutdown_tx.clone()));

    let result = drive(&scheduler, |cancel| job.run(cancel), shutdown_rx).await;
    signal_handle.abort();
    match signal_handle.await {
        Ok(inner) => inner?,
        Err(err) if err.is_cancelled() => {}
        Err(err) => return Err(DaemonError::Task(format!("signal task join failure: {err}"))),
    }
    result
}

/// Core loop: tick the scheduler, run `body` when due, sleep otherwise.
///
/// A message on `shutdown` while waiting returns immediately. While a run
/// is in flight it raises the run's cancel flag and waits for `body` to
/// finish the current item before returning; a second message abandons
/// the run and returns at once.
///
/// Schedule errors are fatal. A failed run is logged and the loop continues
/// with the deadline already committed.
pub async fn drive<C, S, F, Fut>(
    scheduler: &Scheduler<C, S>,
    mut body: F,
    mut shutdown: broadcast::Receiver<Termination>,
) -> Result<Termination, DaemonError>
where
    C: Clock,
    S: ScheduleStore,
    F: FnMut(Arc<AtomicBool>) -> Fut,
    Fut: Future<Output = Result<RunReport, DaemonError>>,
{
    loop {
        match scheduler.tick()? {
            Decision::RunNow {
                reason,
                next_deadline,
            } => {
                tracing::info!(%reason, next_run = %next_deadline, "sync starting");
                let cancel = Arc::new(AtomicBool::new(false));
                let cycle = body(cancel.clone());
                tokio::pin!(cycle);

                tokio::select! {
                    result = &mut cycle => log_cycle(result, next_deadline),
                    received = shutdown.recv() => {
                        cancel.store(true, Ordering::SeqCst);
                        let first = termination(received);
                        tokio::select! {
                            result = &mut cycle => log_cycle(result, next_deadline),
                            Ok(again) = shutdown.recv() => {
                                tracing::warn!(termination = ?again, "second signal; abandoning the current item");
                            }
                        }
                        return Ok(first);
                    }
                }
            }
            Decision::Wait { delay, deadline } => {
                tracing::info!(next_run = %deadline, delay_secs = delay.as_secs(), "waiting for next run");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    received = shutdown.recv() => return Ok(termination(received)),
                }
            }
        }
    }
}

fn termination(received: Result<Termination, broadcast::error::RecvError>) -> Termination {
    received.unwrap_or(Termination::Shutdown)
}

fn log_cycle(
    result: Result<RunReport, DaemonError>,
    next_deadline: chrono::DateTime<chrono::Utc>,
) {
    match result {
        Ok(report) => {
            let summary = report.summary();
            tracing::info!(
                downloaded = summary.downloaded,
                up_to_date = summary.up_to_date,
                restricted = summary.restricted,
                failed = summary.failed,
                warnings = summary.warnings,
                cancelled = report.cancelled,
                "sync finished"
            );
        }
        Err(err) => tracing::error!(error = %err, "sync failed"),
    }
    tracing::info!(next_run = %next_deadline, "next run scheduled");
}

/// Broadcast every SIGINT/SIGTERM until nobody is listening.
#[cfg(unix)]
async fn forward_signals(shutdown: broadcast::Sender<Termination>) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT handler", e))?;
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    loop {
        let termination = tokio::select! {
            _ = interrupt.recv() => Termination::Signal(SIGINT),
            _ = terminate.recv() => Termination::Signal(SIGTERM),
        };
        tracing::info!(?termination, "signal received; stopping after current item");
        if shutdown.send(termination).is_err() {
            return Ok(());
        }
    }
}

#[cfg(not(unix))]
async fn forward_signals(shutdown: broadcast::Sender<Termination>) -> Result<(), DaemonError> {
    loop {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| io_err("ctrl-c handler", e))?;
        tracing::info!("interrupt received; stopping after current item");
        if shutdown.send(Termination::Signal(SIGINT)).is_err() {
            return Ok(());
        }
    }
}

/// Install the fmt subscriber. `log` records from the sync crate are bridged
/// through the subscriber's log compatibility layer.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
