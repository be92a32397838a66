use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_MILLISECS_BETWEEN_POLLS: u64 = 20_000;

type JobFunction = dyn Fn() -> anyhow::Result<()> + Send + Sync;

enum JobState {
    Idle,
    Running {
        stop: mpsc::Sender<()>,
        worker: JoinHandle<()>,
    },
    Stopped,
}

/// Calls a function on a background thread at a fixed interval.
///
/// `stop` ends the ticking and then calls the function one last time, so work
/// that appeared after the final tick is still picked up. Errors returned by
/// the function are logged and never end the job.
pub struct PeriodicJob {
    name: String,
    interval: Duration,
    function: Arc<JobFunction>,
    state: Mutex<JobState>,
}

impl PeriodicJob {
    pub fn new<F>(name: impl Into<String>, interval: Duration, function: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interval,
            function: Arc::new(function),
            state: Mutex::new(JobState::Idle),
        }
    }

    pub fn with_default_interval<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(
            name,
            Duration::from_millis(DEFAULT_MILLISECS_BETWEEN_POLLS),
            function,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state(), JobState::Running { .. })
    }

    pub fn start(&self) -> Result<()> {
        let mut state = self.state();
        match *state {
            JobState::Idle => {}
            JobState::Running { .. } => return Err(self.job_error("has already been started")),
            JobState::Stopped => return Err(self.job_error("has been stopped and cannot restart")),
        }

        let (stop, stop_signal) = mpsc::channel::<()>();
        let name = self.name.clone();
        let interval = self.interval;
        let function = Arc::clone(&self.function);
        let worker = thread::Builder::new()
            .name(format!("termsnap-job-{}", self.name))
            .spawn(move || run_ticks(&name, interval, stop_signal, function.as_ref()))
            .map_err(|error| self.job_error(format!("could not spawn worker thread: {error}")))?;

        *state = JobState::Running { stop, worker };
        info!(
            job = %self.name,
            interval_ms = self.interval.as_millis() as u64,
            "job started"
        );
        Ok(())
    }

    /// Stops ticking, waits for the worker and runs the function once more.
    ///
    /// Only the first call on a running job does anything; later or
    /// concurrent calls return once that call has finished.
    pub fn stop(&self) {
        let mut state = self.state();
        let (stop, worker) = match std::mem::replace(&mut *state, JobState::Stopped) {
            JobState::Running { stop, worker } => (stop, worker),
            previous => {
                *state = previous;
                debug!(job = %self.name, "job is not running, nothing to stop");
                return;
            }
        };

        let _ = stop.send(());
        drop(stop);
        if worker.join().is_err() {
            warn!(job = %self.name, "job worker thread panicked");
        }
        info!(job = %self.name, "job stopped, running it one last time");
        if let Err(error) = (self.function)() {
            warn!(job = %self.name, "final run failed: {error:#}");
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_error(&self, reason: impl Into<String>) -> Error {
        Error::Job {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

fn run_ticks(
    name: &str,
    interval: Duration,
    stop_signal: mpsc::Receiver<()>,
    function: &JobFunction,
) {
    let mut next_tick = Instant::now() + interval;
    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        match stop_signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                debug!(job = name, "tick");
                if let Err(error) = function() {
                    warn!(job = name, "job function failed: {error:#}");
                }
                next_tick += interval;
                let now = Instant::now();
                // Missed ticks are dropped rather than run back to back.
                if next_tick < now {
                    next_tick = now + interval;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(job = name, "job loop finished");
}
