use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::pipeline::dispatch::{DispatchOutcome, Dispatcher};
use crate::system::sampler::SnapshotSource;

/// Pause between the end of one dispatch and the start of the next
/// measurement. With the ~1 s CPU window a snapshot lands roughly every 1.5 s.
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

pub const SAMPLER_THREAD_NAME: &str = "sampler";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

struct Control {
    state: Mutex<LoopState>,
    wake: Condvar,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `interval` unless a stop arrives first. Returns whether the
    /// loop should run another tick.
    fn wait_for_next_tick(&self, interval: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, interval, |state| *state == LoopState::Running)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == LoopState::Running
    }
}

/// Owns the periodic cadence on a dedicated worker thread. Stopping is
/// cooperative: an in-flight measurement finishes, no new tick starts.
pub struct SamplingLoop {
    control: Arc<Control>,
    interval: Duration,
    worker: Option<JoinHandle<()>>,
}

impl Default for SamplingLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingLoop {
    pub fn new() -> Self {
        Self::with_interval(TICK_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        SamplingLoop {
            control: Arc::new(Control {
                state: Mutex::new(LoopState::Idle),
                wake: Condvar::new(),
            }),
            interval,
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        *self.control.lock()
    }

    pub fn start<S>(&mut self, mut source: S, dispatcher: Dispatcher) -> Result<(), PipelineError>
    where
        S: SnapshotSource + 'static,
    {
        {
            let mut state = self.control.lock();
            if *state != LoopState::Idle {
                return Err(PipelineError::AlreadyStarted);
            }
            *state = LoopState::Running;
        }

        let control = Arc::clone(&self.control);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(SAMPLER_THREAD_NAME.to_string())
            .spawn(move || {
                run_worker(&mut source, &dispatcher, &control, interval);
                *control.lock() = LoopState::Stopped;
                drop(dispatcher);
                info!("sampling loop stopped");
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                info!(interval_ms = interval.as_millis() as u64, "sampling loop started");
                Ok(())
            }
            Err(err) => {
                *self.control.lock() = LoopState::Stopped;
                Err(PipelineError::Spawn(err))
            }
        }
    }

    /// Request shutdown. Safe to call any number of times, from any state.
    pub fn stop(&self) {
        let mut state = self.control.lock();
        match *state {
            LoopState::Running => {
                *state = LoopState::Stopping;
                debug!("sampling loop stopping");
                self.control.wake.notify_all();
            }
            LoopState::Idle => *state = LoopState::Stopped,
            LoopState::Stopping | LoopState::Stopped => {}
        }
    }

    /// Wait for the worker to finish its current tick and exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            error!("sampler thread panicked outside a tick");
            *self.control.lock() = LoopState::Stopped;
        }
    }

    pub fn shutdown(&mut self) {
        self.stop();
        self.join();
    }
}

impl Drop for SamplingLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S: SnapshotSource>(
    source: &mut S,
    dispatcher: &Dispatcher,
    control: &Control,
    interval: Duration,
) {
    let mut ticks: u64 = 0;
    loop {
        if *control.lock() != LoopState::Running {
            break;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| source.sample())) {
            Ok(snapshot) => {
                ticks += 1;
                if dispatcher.dispatch(snapshot) == DispatchOutcome::Closed {
                    debug!(tick = ticks, "presentation side gone, snapshot discarded");
                }
            }
            Err(_) => error!("sampling tick panicked, continuing with next tick"),
        }

        if !control.wait_for_next_tick(interval) {
            break;
        }
    }
    debug!(ticks, "sampler worker exiting");
}
