//! Error classification: map any failure into a stable, user-facing taxonomy.
//!
//! Every stage that can fail (validation, upload, polling, download) ends up
//! here. The rules are an ordered table of `(predicate, outcome)` pairs
//! evaluated top to bottom; the first predicate that matches decides the
//! result. Response-based rules sit above message-text rules, so an HTTP 400
//! whose detail mentions a password is `PASSWORD_PROTECTED` even when the
//! error's own message also mentions a size.
//!
//! A second, display-only mapping ([`explain_job_failure`]) turns the
//! `error_message` of a `FAILED` job into prose. A failed job is a normal
//! terminal outcome, not a transport error, so it never goes through the
//! rule table.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ── Taxonomy ─────────────────────────────────────────────────────────────

/// How loudly the presentation layer should render an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// The fixed set of error classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidFileType,
    FileTooLarge,
    /// Zero-byte file rejected before upload.
    EmptyFile,
    UploadFailed,
    NotFound,
    ServerError,
    ServiceUnavailable,
    TimeoutError,
    NetworkError,
    PasswordProtected,
    InvalidPdf,
    EmptyPdf,
    Unknown,
}

impl ErrorKind {
    /// Stable machine-readable code, e.g. `"FILE_TOO_LARGE"`.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidFileType => "INVALID_FILE_TYPE",
            ErrorKind::FileTooLarge => "FILE_TOO_LARGE",
            ErrorKind::EmptyFile => "EMPTY_FILE",
            ErrorKind::UploadFailed => "UPLOAD_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::TimeoutError => "TIMEOUT_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::PasswordProtected => "PASSWORD_PROTECTED",
            ErrorKind::InvalidPdf => "INVALID_PDF",
            ErrorKind::EmptyPdf => "EMPTY_PDF",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::InvalidFileType => "Invalid File Type",
            ErrorKind::FileTooLarge => "File Too Large",
            ErrorKind::EmptyFile => "Empty File",
            ErrorKind::UploadFailed => "Upload Failed",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::ServerError => "Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
            ErrorKind::TimeoutError => "Request Timeout",
            ErrorKind::NetworkError => "Network Error",
            ErrorKind::PasswordProtected => "Password Protected PDF",
            ErrorKind::InvalidPdf => "Invalid PDF",
            ErrorKind::EmptyPdf => "Empty PDF",
            ErrorKind::Unknown => "An Error Occurred",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidFileType => {
                "Please upload a PDF file only. Other file types are not supported."
            }
            ErrorKind::FileTooLarge => {
                "The file size exceeds the maximum limit. Please upload a smaller PDF file."
            }
            ErrorKind::EmptyFile => "The selected file is empty. Please choose a valid PDF file.",
            ErrorKind::UploadFailed => {
                "Failed to upload the file. Please check your internet connection and try again."
            }
            ErrorKind::NotFound => {
                "The requested resource was not found. Please try uploading the file again."
            }
            ErrorKind::ServerError => "The server encountered an error. Please try again later.",
            ErrorKind::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again in a few minutes."
            }
            ErrorKind::TimeoutError => "The request took too long to complete. Please try again.",
            ErrorKind::NetworkError => {
                "Unable to connect to the server. Please check your internet connection."
            }
            ErrorKind::PasswordProtected => {
                "This PDF is password-protected. Please remove the password and try again."
            }
            ErrorKind::InvalidPdf => {
                "The PDF file appears to be corrupted or invalid. Please try a different file."
            }
            ErrorKind::EmptyPdf => "The PDF file appears to be empty or has no content to convert.",
            ErrorKind::Unknown => "Something went wrong. Please try again.",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::PasswordProtected | ErrorKind::EmptyPdf => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// The classification with its templated message.
    pub fn classified(self) -> ClassifiedError {
        self.with_message(self.default_message())
    }

    /// The classification with a caller- or server-supplied message.
    pub fn with_message(self, message: impl Into<String>) -> ClassifiedError {
        ClassifiedError {
            kind: self,
            title: self.title().to_string(),
            message: message.into(),
            severity: self.severity(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A `(title, message, severity)` triple ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{title}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

// ── Classifier input ─────────────────────────────────────────────────────

/// What the transport layer observed for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// The service answered with `status`.
    Response { status: u16, detail: Option<String> },
    /// Nothing came back.
    NoResponse { timed_out: bool },
    /// The failure never involved the network (disk, config).
    Local,
}

/// Everything the rule table may inspect about one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSignal {
    pub transport: Transport,
    /// The error's own message text.
    pub message: String,
}

impl FailureSignal {
    pub fn response(status: u16, detail: Option<String>, message: impl Into<String>) -> Self {
        Self {
            transport: Transport::Response { status, detail },
            message: message.into(),
        }
    }

    pub fn no_response(timed_out: bool, message: impl Into<String>) -> Self {
        Self {
            transport: Transport::NoResponse { timed_out },
            message: message.into(),
        }
    }

    pub fn local(message: impl Into<String>) -> Self {
        Self {
            transport: Transport::Local,
            message: message.into(),
        }
    }

    fn status(&self) -> Option<u16> {
        match self.transport {
            Transport::Response { status, .. } => Some(status),
            _ => None,
        }
    }

    fn detail(&self) -> Option<&str> {
        match &self.transport {
            Transport::Response { detail, .. } => detail.as_deref().filter(|d| !d.is_empty()),
            _ => None,
        }
    }

    fn detail_contains(&self, needle: &str) -> bool {
        self.detail()
            .map(|d| d.to_lowercase().contains(needle))
            .unwrap_or(false)
    }

    fn message_contains(&self, needle: &str) -> bool {
        self.message.to_lowercase().contains(needle)
    }
}

// ── Rule table ───────────────────────────────────────────────────────────

/// One row of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&FailureSignal) -> bool,
    pub outcome: fn(&FailureSignal) -> ClassifiedError,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Rules in priority order; the first match wins.
pub static RULES: &[Rule] = &[
    // 1. HTTP responses
    Rule {
        name: "http-400-file-type",
        matches: |s| s.status() == Some(400) && s.detail_contains("file type"),
        outcome: |_| ErrorKind::InvalidFileType.classified(),
    },
    Rule {
        name: "http-400-size",
        matches: |s| s.status() == Some(400) && s.detail_contains("size"),
        outcome: |_| ErrorKind::FileTooLarge.classified(),
    },
    Rule {
        name: "http-400-password",
        matches: |s| s.status() == Some(400) && s.detail_contains("password"),
        outcome: |_| ErrorKind::PasswordProtected.classified(),
    },
    Rule {
        name: "http-400",
        matches: |s| s.status() == Some(400),
        outcome: upload_failed_with_detail,
    },
    Rule {
        name: "http-404",
        matches: |s| s.status() == Some(404),
        outcome: |_| ErrorKind::NotFound.classified(),
    },
    Rule {
        name: "http-413",
        matches: |s| s.status() == Some(413),
        outcome: |_| ErrorKind::FileTooLarge.classified(),
    },
    Rule {
        name: "http-500",
        matches: |s| s.status() == Some(500),
        outcome: server_error_with_detail,
    },
    Rule {
        name: "http-503",
        matches: |s| s.status() == Some(503),
        outcome: |_| ErrorKind::ServiceUnavailable.classified(),
    },
    // 2. Timeout without a response
    Rule {
        name: "timeout",
        matches: |s| match s.transport {
            Transport::NoResponse { timed_out } => timed_out || s.message_contains("timeout"),
            _ => false,
        },
        outcome: |_| ErrorKind::TimeoutError.classified(),
    },
    // 3. Any other failure without a response
    Rule {
        name: "no-response",
        matches: |s| matches!(s.transport, Transport::NoResponse { .. }),
        outcome: |_| ErrorKind::NetworkError.classified(),
    },
    // 4. The error's own message text
    Rule {
        name: "message-file-type",
        matches: |s| s.message_contains("file type"),
        outcome: |_| ErrorKind::InvalidFileType.classified(),
    },
    Rule {
        name: "message-size",
        matches: |s| s.message_contains("too large") || s.message_contains("size"),
        outcome: |_| ErrorKind::FileTooLarge.classified(),
    },
    Rule {
        name: "message-corrupt",
        matches: |s| s.message_contains("corrupt"),
        outcome: |_| ErrorKind::InvalidPdf.classified(),
    },
    Rule {
        name: "message-password",
        matches: |s| s.message_contains("password"),
        outcome: |_| ErrorKind::PasswordProtected.classified(),
    },
    Rule {
        name: "message-empty",
        matches: |s| s.message_contains("empty"),
        outcome: |_| ErrorKind::EmptyPdf.classified(),
    },
    // 5. Fallback
    Rule {
        name: "unknown",
        matches: |_| true,
        outcome: |s| {
            if s.message.is_empty() {
                ErrorKind::Unknown.classified()
            } else {
                ErrorKind::Unknown.with_message(s.message.clone())
            }
        },
    },
];

fn upload_failed_with_detail(s: &FailureSignal) -> ClassifiedError {
    match s.detail() {
        Some(d) => ErrorKind::UploadFailed.with_message(d),
        None => ErrorKind::UploadFailed.classified(),
    }
}

fn server_error_with_detail(s: &FailureSignal) -> ClassifiedError {
    match s.detail() {
        Some(d) => ErrorKind::ServerError.with_message(d),
        None => ErrorKind::ServerError.classified(),
    }
}

/// Classify a failure, returning the name of the rule that fired as well.
pub fn classify_with_rule(signal: &FailureSignal) -> (&'static str, ClassifiedError) {
    for rule in RULES {
        if (rule.matches)(signal) {
            return (rule.name, (rule.outcome)(signal));
        }
    }
    // The table ends with a catch-all.
    ("unknown", ErrorKind::Unknown.with_message(signal.message.clone()))
}

/// Classify a failure signal.
pub fn classify(signal: &FailureSignal) -> ClassifiedError {
    classify_with_rule(signal).1
}

/// Classify a [`crate::error::ClientError`].
pub fn classify_error(error: &crate::error::ClientError) -> ClassifiedError {
    let (rule, classified) = classify_with_rule(&error.signal());
    tracing::debug!("classified '{}' via rule {} as {}", error, rule, classified.kind);
    classified
}

// ── Job failure explanations ─────────────────────────────────────────────

/// Families of server-side `error_message` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureFamily {
    PasswordProtected,
    Corrupt,
    Empty,
    Timeout,
    Ocr,
    Resources,
}

const FAMILIES: &[(FailureFamily, &[&str], &str)] = &[
    (
        FailureFamily::PasswordProtected,
        &["password", "encrypted"],
        "This PDF is password-protected. Please remove the password and try again.",
    ),
    (
        FailureFamily::Corrupt,
        &["corrupt", "invalid"],
        "The PDF file appears to be corrupted or invalid. Please try a different file.",
    ),
    (
        FailureFamily::Empty,
        &["empty", "no content"],
        "The PDF appears to be empty or has no content to convert.",
    ),
    (
        FailureFamily::Timeout,
        &["timeout", "took too long"],
        "The conversion took too long. Please try again with a smaller file.",
    ),
    (
        FailureFamily::Ocr,
        &["ocr", "tesseract"],
        "OCR processing failed. The scanned document may be too complex or low quality.",
    ),
    (
        FailureFamily::Resources,
        &["memory", "resource"],
        "The server ran out of resources. Please try again later or use a smaller file.",
    ),
];

/// Human-readable account of why a job ended `FAILED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailureExplanation {
    /// `None` when no family matched and `message` is the raw server text.
    pub family: Option<FailureFamily>,
    pub message: String,
}

/// Explain a terminal job's `error_message`.
pub fn explain_job_failure(error_message: Option<&str>) -> JobFailureExplanation {
    let Some(raw) = error_message.filter(|m| !m.trim().is_empty()) else {
        return JobFailureExplanation {
            family: None,
            message: "An unknown error occurred. Please try again.".to_string(),
        };
    };

    let lower = raw.to_lowercase();
    FAMILIES
        .iter()
        .find(|(_, needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(family, _, text)| JobFailureExplanation {
            family: Some(*family),
            message: (*text).to_string(),
        })
        .unwrap_or_else(|| JobFailureExplanation {
            family: None,
            message: raw.to_string(),
        })
}
