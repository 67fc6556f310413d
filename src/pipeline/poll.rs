//! Status polling: one cancellable loop per job, tagged with a generation.
//!
//! ## Loop discipline
//!
//! The delay runs *after* each completed round-trip, never on a fixed-rate
//! timer, so at most one fetch is outstanding and a slow service cannot make
//! requests pile up:
//!
//! ```text
//! start ──▶ sleep(interval) ──▶ GET /api/conversions/{id}/ ──▶ non-terminal ─┐
//!              ▲                                                              │
//!              └──────────────────────────────────────────────────────────────┘
//!                                      terminal → STOPPED, transport error → STOPPED
//! ```
//!
//! ## Cancellation
//!
//! [`ConversionPoller::stop`] bumps the generation and cancels the pending
//! sleep. A fetch already in flight is allowed to finish, but its result is
//! compared against the generation under the same lock `stop` takes, so once
//! `stop` has returned no callback from the old loop can run.
//!
//! Callbacks run while that lock is held. They must be short and must not
//! call back into the poller.

use crate::api::ConversionApi;
use crate::classify::{classify_error, ClassifiedError};
use crate::job::Conversion;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of the poller: `IDLE → RUNNING → STOPPED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopped,
}

/// Identifies the loop launched by one [`ConversionPoller::start`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollHandle(u64);

impl PollHandle {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Shared {
    state: PollerState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl Shared {
    fn halt(&mut self) {
        self.state = PollerState::Stopped;
        self.generation += 1;
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

/// Polls one job at a time until it reaches a terminal status.
pub struct ConversionPoller {
    api: Arc<dyn ConversionApi>,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
}

impl ConversionPoller {
    pub fn new(api: Arc<dyn ConversionApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            shared: Arc::new(Mutex::new(Shared {
                state: PollerState::Idle,
                generation: 0,
                cancel: None,
            })),
        }
    }

    pub fn state(&self) -> PollerState {
        lock(&self.shared).state
    }

    /// Handle of the running loop, if any.
    pub fn current(&self) -> Option<PollHandle> {
        let shared = lock(&self.shared);
        (shared.state == PollerState::Running).then_some(PollHandle(shared.generation))
    }

    /// Start polling `job_id`, replacing any loop already running.
    ///
    /// `on_update` receives every snapshot in fetch order, the terminal one
    /// included. `on_error` receives the classified error of the first
    /// failed fetch; polling then stops for good.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<U, E>(&self, job_id: impl Into<String>, on_update: U, on_error: E) -> PollHandle
    where
        U: Fn(Conversion) + Send + 'static,
        E: FnOnce(ClassifiedError) + Send + 'static,
    {
        let job_id = job_id.into();
        let token = CancellationToken::new();
        let generation = {
            let mut shared = lock(&self.shared);
            if shared.state == PollerState::Running {
                debug!("Replacing poll loop generation {}", shared.generation);
            }
            shared.halt();
            shared.state = PollerState::Running;
            shared.cancel = Some(token.clone());
            shared.generation
        };

        info!("Polling conversion {} every {:?}", job_id, self.interval);
        let ctx = LoopContext {
            api: Arc::clone(&self.api),
            shared: Arc::clone(&self.shared),
            generation,
            token,
            job_id,
            interval: self.interval,
        };
        tokio::spawn(ctx.run(on_update, on_error));
        PollHandle(generation)
    }

    /// Stop the running loop. A no-op when idle or already stopped.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        if shared.state == PollerState::Running {
            debug!("Stopping poll loop generation {}", shared.generation);
            shared.halt();
        }
    }

    /// Stop only if `handle` is still the running loop.
    ///
    /// Returns `true` when the loop was stopped by this call.
    pub fn stop_handle(&self, handle: PollHandle) -> bool {
        let mut shared = lock(&self.shared);
        if shared.state == PollerState::Running && shared.generation == handle.0 {
            shared.halt();
            true
        } else {
            false
        }
    }
}

impl Drop for ConversionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // Callbacks run under this lock; a panicking callback must not wedge stop().
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

struct LoopContext {
    api: Arc<dyn ConversionApi>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    token: CancellationToken,
    job_id: String,
    interval: Duration,
}

impl LoopContext {
    async fn run<U, E>(self, on_update: U, on_error: E)
    where
        U: Fn(Conversion) + Send + 'static,
        E: FnOnce(ClassifiedError) + Send + 'static,
    {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("Poll loop {} cancelled while waiting", self.generation);
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            let result = self.api.get_conversion(&self.job_id).await;

            let mut shared = lock(&self.shared);
            if shared.generation != self.generation {
                debug!(
                    "Discarding result for {} from stale poll loop {}",
                    self.job_id, self.generation
                );
                return;
            }

            match result {
                Ok(job) if job.is_terminal() => {
                    info!("Conversion {} reached {}", job.id, job.status);
                    shared.state = PollerState::Stopped;
                    shared.cancel = None;
                    on_update(job);
                    return;
                }
                Ok(job) => {
                    debug!("Conversion {} is {}", job.id, job.status);
                    on_update(job);
                }
                Err(e) => {
                    warn!("Polling {} failed: {}", self.job_id, e);
                    shared.state = PollerState::Stopped;
                    shared.cancel = None;
                    on_error(classify_error(&e));
                    return;
                }
            }
        }
    }
}
