//! One conversion session: validate, upload, poll, download.
//!
//! [`SessionController`] is the only thing that mutates session state. The
//! pipeline stages return values or invoke callbacks, and every callback is
//! tagged with the session generation it was issued for. [`reset`] and a new
//! [`start`] bump the generation, so late results from an abandoned upload or
//! poll loop are dropped instead of resurrecting old state.
//!
//! ## Lock order
//!
//! Poll callbacks run under the poller's lock and then take the session lock.
//! The controller therefore never calls into the poller while holding the
//! session lock.
//!
//! [`reset`]: SessionController::reset
//! [`start`]: SessionController::start

use crate::api::{ConversionApi, HttpConversionApi};
use crate::classify::{classify_error, explain_job_failure, ClassifiedError, JobFailureExplanation};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::job::{CompletedJob, Conversion, ConversionStatus};
use crate::pipeline::download;
use crate::pipeline::poll::{ConversionPoller, PollHandle};
use crate::pipeline::upload::upload;
use crate::pipeline::validate::{validate, PdfFile};
use crate::progress::ProgressCallback;
use crate::stream::SessionStream;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ── Snapshot ─────────────────────────────────────────────────────────────

/// Coarse position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Uploading,
    Processing,
    Completed,
    Failed,
}

/// Read-only view of the session, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub file_name: Option<String>,
    /// `0..=100`, non-decreasing during one upload.
    pub upload_progress: u8,
    pub uploading: bool,
    /// Last known job snapshot; `None` until the upload has been accepted.
    pub active_job: Option<Conversion>,
    /// Whether a poll loop is scheduled for `active_job`.
    pub polling: bool,
    pub last_error: Option<ClassifiedError>,
    /// Non-blocking notice, e.g. for files over 50 MiB.
    pub advisory: Option<String>,
    /// Set when `active_job` ended `FAILED`.
    pub failure: Option<JobFailureExplanation>,
    /// The last attempt was rejected before upload, or its upload or poll
    /// loop ended in an error. Survives `dismiss_error`.
    pub interrupted: bool,
}

impl SessionSnapshot {
    pub fn phase(&self) -> SessionPhase {
        if self.uploading {
            return SessionPhase::Uploading;
        }
        match &self.active_job {
            Some(job) if job.status == ConversionStatus::Completed => SessionPhase::Completed,
            Some(job) if job.status == ConversionStatus::Failed => SessionPhase::Failed,
            _ if self.interrupted => SessionPhase::Failed,
            Some(_) => SessionPhase::Processing,
            None => SessionPhase::Idle,
        }
    }

    /// True once nothing further will happen without a new `start`.
    pub fn is_settled(&self) -> bool {
        matches!(self.phase(), SessionPhase::Completed | SessionPhase::Failed)
    }

    /// A download is offered only for a `COMPLETED` job.
    pub fn download_available(&self) -> bool {
        self.completed_job().is_some()
    }

    pub fn completed_job(&self) -> Option<CompletedJob> {
        self.active_job.as_ref().and_then(Conversion::completed)
    }
}

// ── Internal state ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    generation: u64,
    file_name: Option<String>,
    upload_progress: u8,
    uploading: bool,
    active_job: Option<Conversion>,
    poll_handle: Option<PollHandle>,
    last_error: Option<ClassifiedError>,
    advisory: Option<String>,
    interrupted: bool,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        let failure = self
            .active_job
            .as_ref()
            .filter(|j| j.status == ConversionStatus::Failed)
            .map(|j| explain_job_failure(j.error_message.as_deref()));
        SessionSnapshot {
            file_name: self.file_name.clone(),
            upload_progress: self.upload_progress,
            uploading: self.uploading,
            active_job: self.active_job.clone(),
            polling: self.poll_handle.is_some(),
            last_error: self.last_error.clone(),
            advisory: self.advisory.clone(),
            failure,
            interrupted: self.interrupted,
        }
    }

    /// Discard everything except the generation counter, which moves on.
    fn clear(&mut self) {
        *self = SessionState {
            generation: self.generation + 1,
            ..SessionState::default()
        };
    }

    /// Apply a polled snapshot. Terminal snapshots are final.
    fn apply_job(&mut self, job: Conversion) -> bool {
        match &self.active_job {
            Some(current) if current.is_terminal() => {
                debug!("Ignoring {} update for settled job {}", job.status, current.id);
                return false;
            }
            Some(current) if current.id != job.id => {
                warn!("Ignoring update for {}; session tracks {}", job.id, current.id);
                return false;
            }
            Some(current) if !current.status.can_advance_to(job.status) => {
                warn!(
                    "Job {} went from {} back to {}",
                    job.id, current.status, job.status
                );
            }
            _ => {}
        }
        if job.is_terminal() {
            self.poll_handle = None;
        }
        self.active_job = Some(job);
        true
    }
}

struct SessionShared {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Run `f` if the session is still at `generation`, then publish.
    ///
    /// Returns `None` when the session has moved on.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(
                "Dropping result for session generation {} (now {})",
                generation, state.generation
            );
            return None;
        }
        let r = f(&mut state);
        self.publish(&state);
        Some(r)
    }
}

// ── Controller ───────────────────────────────────────────────────────────

/// Drives one session at a time against a conversion service.
///
/// Dropping the controller stops any running poll loop.
pub struct SessionController {
    api: Arc<dyn ConversionApi>,
    poller: ConversionPoller,
    progress: Option<ProgressCallback>,
    shared: Arc<SessionShared>,
}

impl SessionController {
    /// Controller talking HTTP to `config.base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = HttpConversionApi::new(config)?;
        Ok(Self::with_api(Arc::new(api), config))
    }

    /// Controller over any [`ConversionApi`] implementation.
    pub fn with_api(api: Arc<dyn ConversionApi>, config: &ClientConfig) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            poller: ConversionPoller::new(Arc::clone(&api), config.poll_interval()),
            api,
            progress: config.progress_callback.clone(),
            shared: Arc::new(SessionShared {
                state: Mutex::new(SessionState::default()),
                updates,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Snapshots as a `Stream`, starting with the current one.
    pub fn stream(&self) -> SessionStream {
        SessionStream::new(self.subscribe())
    }

    /// Validate `file`, upload it and start polling the created job.
    ///
    /// A file that fails validation is reported in `last_error` and never
    /// reaches the network. An upload or job already in progress is left
    /// alone; an idle session records the rejected file and fails. Otherwise
    /// any previous session is discarded first. Returns once the upload has
    /// finished; polling continues in the background.
    ///
    /// If the session is reset while the upload is in flight, its outcome is
    /// discarded and `Ok(())` is returned.
    pub async fn start(&self, file: PdfFile) -> Result<(), ClassifiedError> {
        let report = match validate(&file) {
            Ok(report) => report,
            Err(e) => {
                info!("Rejected '{}': {}", file.name(), e);
                let mut state = self.shared.lock();
                if !state.uploading && state.active_job.is_none() {
                    state.file_name = Some(file.name().to_string());
                    state.interrupted = true;
                }
                state.last_error = Some(e.clone());
                self.shared.publish(&state);
                return Err(e);
            }
        };

        self.poller.stop();
        let generation = {
            let mut state = self.shared.lock();
            state.clear();
            state.file_name = Some(file.name().to_string());
            state.uploading = true;
            state.advisory = report.advisory().map(str::to_string);
            self.shared.publish(&state);
            state.generation
        };

        info!("Uploading '{}' ({} bytes)", file.name(), file.size());
        if let Some(cb) = &self.progress {
            cb.on_upload_start(file.name(), file.size());
        }

        let on_progress = {
            let shared = Arc::clone(&self.shared);
            let observer = self.progress.clone();
            move |percent: u8| {
                let fresh = shared
                    .update(generation, |s| s.upload_progress = s.upload_progress.max(percent))
                    .is_some();
                if let (true, Some(cb)) = (fresh, &observer) {
                    cb.on_upload_progress(percent);
                }
            }
        };

        let job = match upload(&*self.api, &file, on_progress).await {
            Ok(job) => job,
            Err(e) => {
                let classified = classify_error(&e);
                let fresh = self
                    .shared
                    .update(generation, |s| {
                        s.uploading = false;
                        s.interrupted = true;
                        s.last_error = Some(classified.clone());
                    })
                    .is_some();
                if !fresh {
                    return Ok(());
                }
                if let Some(cb) = &self.progress {
                    cb.on_upload_error(&classified.message);
                }
                return Err(classified);
            }
        };

        let accepted = self.shared.update(generation, |s| {
            s.uploading = false;
            s.upload_progress = 100;
            s.active_job = Some(job.clone());
        });
        if accepted.is_none() {
            info!("Session was reset during upload; discarding job {}", job.id);
            return Ok(());
        }
        if let Some(cb) = &self.progress {
            cb.on_upload_complete(&job);
        }

        if job.is_terminal() {
            return Ok(());
        }
        self.begin_polling(generation, &job.id);
        Ok(())
    }

    fn begin_polling(&self, generation: u64, job_id: &str) {
        let on_update = {
            let shared = Arc::clone(&self.shared);
            move |job: Conversion| {
                shared.update(generation, |s| s.apply_job(job));
            }
        };
        let on_error = {
            let shared = Arc::clone(&self.shared);
            move |e: ClassifiedError| {
                shared.update(generation, |s| {
                    s.poll_handle = None;
                    s.interrupted = true;
                    s.last_error = Some(e);
                });
            }
        };

        let handle = self.poller.start(job_id, on_update, on_error);

        // The loop may already have settled, or the session may have moved on.
        let recorded = self.shared.update(generation, |s| {
            let live = !s.interrupted
                && s.active_job.as_ref().is_some_and(|j| !j.is_terminal());
            if live {
                s.poll_handle = Some(handle);
            }
        });
        if recorded.is_none() {
            self.poller.stop_handle(handle);
        }
    }

    /// Stop polling and return to the pre-start state. Safe at any time.
    pub fn reset(&self) {
        self.poller.stop();
        let mut state = self.shared.lock();
        debug!("Resetting session generation {}", state.generation);
        state.clear();
        self.shared.publish(&state);
    }

    /// Clear `last_error` only. The phase does not change.
    pub fn dismiss_error(&self) {
        let mut state = self.shared.lock();
        if state.last_error.take().is_some() {
            self.shared.publish(&state);
        }
    }

    /// The active job, if it has completed.
    pub fn completed_job(&self) -> Option<CompletedJob> {
        self.shared.lock().active_job.as_ref().and_then(Conversion::completed)
    }

    /// Download `job` into `dir`.
    ///
    /// A failure is also recorded in `last_error` while the session still
    /// tracks the same job.
    pub async fn download(
        &self,
        job: &CompletedJob,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf, ClassifiedError> {
        let generation = self.shared.lock().generation;
        download::download(&*self.api, job, dir).await.map_err(|e| {
            self.shared.update(generation, |s| {
                if s.active_job.as_ref().is_some_and(|j| j.id == job.id()) {
                    s.last_error = Some(e.clone());
                }
            });
            e
        })
    }
}
