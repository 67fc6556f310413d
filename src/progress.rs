//! Progress-callback trait for upload events.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events while a PDF is being sent to the service.
//!
//! Status changes after the upload are published through
//! [`crate::session::SessionController::subscribe`] instead; this trait only
//! covers the part of a session where bytes are moving.
//!
//! # Example
//!
//! ```rust
//! use pdf2docx::{ClientConfig, UploadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl UploadProgressCallback for LastPercent {
//!     fn on_upload_progress(&self, percent: u8) {
//!         self.0.store(percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(LastPercent(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::job::Conversion;
use std::sync::Arc;

/// Called by the upload stage as a file is submitted.
///
/// Implementations must be `Send + Sync`: the upload body is polled from the
/// HTTP connection task. All methods default to no-ops so callers only
/// override what they care about.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once before the first byte is sent.
    ///
    /// # Arguments
    /// * `file_name`   — name the file is submitted under
    /// * `total_bytes` — size of the file
    fn on_upload_start(&self, file_name: &str, total_bytes: u64) {
        let _ = (file_name, total_bytes);
    }

    /// Called with a percentage in `0..=100`, never decreasing within one upload.
    fn on_upload_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called once the service has created the job.
    fn on_upload_complete(&self, job: &Conversion) {
        let _ = job;
    }

    /// Called when the upload failed; `error` is the classified message.
    fn on_upload_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;
