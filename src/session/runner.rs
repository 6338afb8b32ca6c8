//! Single-flight job runner and the periodic scheduler built on it.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::foundation::error::{CloudError, CloudResult};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    /// Another run was in flight; the trigger was dropped.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerReason {
    Startup,
    Interval,
    Forced,
}

/// Guards a job so that at most one run is in flight. Overlapping triggers are dropped.
#[derive(Debug, Default)]
pub struct JobRunner {
    state: AtomicU8,
    started: AtomicU64,
    skipped: AtomicU64,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => RunState::Running,
            _ => RunState::Idle,
        }
    }

    pub fn runs_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn runs_skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Move Idle to Running. The returned guard moves it back when dropped.
    pub fn try_start(self: &Arc<Self>) -> Option<RunGuard> {
        match self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.started.fetch_add(1, Ordering::Relaxed);
                Some(RunGuard {
                    runner: Arc::clone(self),
                })
            }
            Err(_) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Poll until no run is in flight. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state() == RunState::Running {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

/// Holds the Running state of a [`JobRunner`].
#[derive(Debug)]
pub struct RunGuard {
    runner: Arc<JobRunner>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.runner.state.store(IDLE, Ordering::Release);
    }
}

enum Command {
    Force,
    Shutdown,
}

type Job = Arc<Mutex<dyn FnMut() + Send>>;

/// Fires a job at start, every `interval`, and on demand. Each run executes on its own worker
/// thread; triggers that arrive while a run is in flight are skipped.
pub struct Scheduler {
    tx: mpsc::Sender<Command>,
    control: Option<JoinHandle<()>>,
    runner: Arc<JobRunner>,
}

impl Scheduler {
    pub fn start<F>(interval: Duration, job: F) -> CloudResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(CloudError::config("scheduler interval must be > 0"));
        }
        let runner = Arc::new(JobRunner::new());
        let job: Job = Arc::new(Mutex::new(job));
        let (tx, rx) = mpsc::channel();

        let control_runner = Arc::clone(&runner);
        let control = std::thread::Builder::new()
            .name("cloudmap-scheduler".to_owned())
            .spawn(move || control_loop(rx, interval, control_runner, job))
            .map_err(|e| CloudError::config(format!("spawn scheduler thread: {e}")))?;
        info!(interval_s = interval.as_secs(), "scheduler started");
        Ok(Self {
            tx,
            control: Some(control),
            runner,
        })
    }

    /// Request a run now, outside the interval.
    pub fn force(&self) -> CloudResult<()> {
        self.tx
            .send(Command::Force)
            .map_err(|_| CloudError::config("scheduler is stopped"))
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    /// Stop scheduling. A run already in flight is left to finish on its worker thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.control.take()
            && handle.join().is_err()
        {
            warn!("scheduler thread panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn control_loop(
    rx: mpsc::Receiver<Command>,
    interval: Duration,
    runner: Arc<JobRunner>,
    job: Job,
) {
    trigger(&runner, &job, TriggerReason::Startup);
    let mut next = Instant::now() + interval;
    loop {
        let wait = next.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Command::Force) => {
                trigger(&runner, &job, TriggerReason::Forced);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                trigger(&runner, &job, TriggerReason::Interval);
                next += interval;
            }
        }
    }
    info!("scheduler stopped");
}

fn trigger(runner: &Arc<JobRunner>, job: &Job, reason: TriggerReason) -> TriggerOutcome {
    let Some(guard) = runner.try_start() else {
        warn!(?reason, "run already in progress, skipping trigger");
        return TriggerOutcome::Skipped;
    };
    let job = Arc::clone(job);
    let spawned = std::thread::Builder::new()
        .name("cloudmap-run".to_owned())
        .spawn(move || {
            let _guard = guard;
            debug!(?reason, "run thread started");
            let mut run = job.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (*run)();
        });
    match spawned {
        Ok(_) => TriggerOutcome::Started,
        Err(e) => {
            warn!("could not spawn run thread: {e}");
            TriggerOutcome::Skipped
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/runner.rs"]
mod tests;
