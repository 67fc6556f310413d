//! Error types for the pdf2docx client.
//!
//! Two layers exist on purpose:
//!
//! * [`ClientError`] — **Mechanical**: what actually went wrong on the wire or
//!   on disk (a non-2xx status, a refused connection, an undecodable body, a
//!   failed write). Returned by [`crate::api::ConversionApi`] and the pipeline
//!   stages.
//!
//! * [`crate::classify::ClassifiedError`] — **User-facing**: a stable
//!   title/message/severity triple derived from a `ClientError` (or from a
//!   validation failure) by the rule table in [`crate::classify`]. This is the
//!   only error a [`crate::session::SessionController`] surfaces.
//!
//! [`ClientError::signal`] is the bridge between the two.

use crate::classify::FailureSignal;
use std::path::PathBuf;
use thiserror::Error;

/// All mechanical failures produced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Transport errors ──────────────────────────────────────────────────
    /// The service answered with a non-2xx status.
    ///
    /// `detail` carries the `detail` or `message` field of the JSON error
    /// body when the service sent one.
    #[error("Request failed with status code {status}")]
    Http { status: u16, detail: Option<String> },

    /// No response arrived before the configured timeout.
    #[error("Request to '{url}' failed: timeout after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Connection-level failure: DNS, refused connection, reset, TLS.
    #[error("Network error contacting '{url}': {reason}")]
    Network { url: String, reason: String },

    /// A 2xx response arrived but its body could not be decoded.
    #[error("Unexpected response from '{url}': {reason}")]
    Decode { url: String, reason: String },

    // ── Local I/O errors ──────────────────────────────────────────────────
    /// Could not read the candidate PDF from disk.
    #[error("Failed to read input file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the downloaded document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Map a `reqwest` failure for `url` onto the matching variant.
    pub(crate) fn from_reqwest(url: &str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else if e.is_decode() || e.is_body() {
            ClientError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            ClientError::Http {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            ClientError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// The HTTP status, when the service produced a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Project this error onto the inputs the classifier inspects.
    ///
    /// The message carries only the failure's own reason. Paths and URLs are
    /// left out: the classifier matches words like "size" or "password" in
    /// it, and a directory name must not decide the outcome.
    pub fn signal(&self) -> FailureSignal {
        match self {
            ClientError::Http { status, detail } => {
                FailureSignal::response(*status, detail.clone(), self.to_string())
            }
            // A 2xx arrived; only the body was bad.
            ClientError::Decode { .. } => {
                FailureSignal::response(200, None, "Unexpected response from the server")
            }
            ClientError::Timeout { secs, .. } => {
                FailureSignal::no_response(true, format!("Request timeout after {secs}s"))
            }
            ClientError::Network { reason, .. } => {
                FailureSignal::no_response(false, reason.clone())
            }
            ClientError::FileRead { source, .. } | ClientError::OutputWriteFailed { source, .. } => {
                FailureSignal::local(source.to_string())
            }
            ClientError::InvalidConfig(reason) | ClientError::Internal(reason) => {
                FailureSignal::local(reason.clone())
            }
        }
    }
}
