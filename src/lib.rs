//! # pdf2docx
//!
//! Client for a remote PDF → Word conversion service.
//!
//! A session picks a PDF, uploads it, watches the server-side job until it
//! finishes, and saves the resulting `.docx`. Every failure along the way,
//! whether local, transport-level or reported by the job itself, ends up as a
//! [`ClassifiedError`] with a fixed title and severity that can be shown to a
//! user as-is.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate  PDF type, 0 < size ≤ 100 MiB (no network)
//!  ├─ 2. Upload    POST /api/conversions/ (multipart, progress %)
//!  ├─ 3. Poll      GET  /api/conversions/{id}/ until COMPLETED or FAILED
//!  └─ 4. Download  GET  /api/conversions/{id}/download/ → <name>.docx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pdf2docx::{ClientConfig, PdfFile, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!     let session = SessionController::new(&config)?;
//!
//!     session.start(PdfFile::from_path("report.pdf").await?).await?;
//!
//!     let mut updates = session.stream().until_settled();
//!     while let Some(snapshot) = updates.next().await {
//!         if let Some(job) = &snapshot.active_job {
//!             eprintln!("{}", job.status.label());
//!         }
//!     }
//!
//!     if let Some(job) = session.completed_job() {
//!         let path = session.download(&job, ".").await?;
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ConversionApi, HttpConversionApi};
pub use classify::{
    classify, classify_error, explain_job_failure, ClassifiedError, ErrorKind, FailureFamily,
    FailureSignal, JobFailureExplanation, Severity,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::ClientError;
pub use job::{CompletedJob, Conversion, ConversionStatus, ConversionType};
pub use pipeline::download::docx_file_name;
pub use pipeline::poll::{ConversionPoller, PollHandle, PollerState};
pub use pipeline::validate::{format_file_size, validate, PdfFile, ValidationReport};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
pub use session::{SessionController, SessionPhase, SessionSnapshot};
pub use stream::{SessionStream, SnapshotStream};
