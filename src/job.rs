//! Conversion job records, mirrored from the remote service.
//!
//! A [`Conversion`] is a read-only snapshot: the service owns the job and the
//! client only ever replaces one snapshot with a newer one. Field names match
//! the service's JSON exactly.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lifecycle of a job: `PENDING → PROCESSING → {COMPLETED | FAILED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ConversionStatus {
    /// `COMPLETED` and `FAILED` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionStatus::Completed | ConversionStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ConversionStatus::Pending => 0,
            ConversionStatus::Processing => 1,
            ConversionStatus::Completed | ConversionStatus::Failed => 2,
        }
    }

    /// Whether `next` is a legal successor of `self` (staying put included).
    pub fn can_advance_to(self, next: ConversionStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    /// Short status line for display.
    pub fn label(self) -> &'static str {
        match self {
            ConversionStatus::Pending => "Queued for processing",
            ConversionStatus::Processing => "Converting PDF to Word",
            ConversionStatus::Completed => "Conversion complete!",
            ConversionStatus::Failed => "Conversion failed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConversionStatus::Pending => "Your file is in the queue and will be processed shortly",
            ConversionStatus::Processing => "Analyzing and converting your document...",
            ConversionStatus::Completed => "Your document is ready for download",
            ConversionStatus::Failed => {
                "Unable to convert the file. Please try again with a different PDF."
            }
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionStatus::Pending => "PENDING",
            ConversionStatus::Processing => "PROCESSING",
            ConversionStatus::Completed => "COMPLETED",
            ConversionStatus::Failed => "FAILED",
        })
    }
}

/// Kind of conversion a job performs.
///
/// Only `PDF_TO_WORD` exists today; unknown tags from a newer service decode
/// as [`ConversionType::Other`] instead of failing the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionType {
    #[default]
    PdfToWord,
    #[serde(other)]
    Other,
}

/// One server-tracked PDF → DOCX job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub id: String,
    pub original_file_name: String,
    pub file_size: u64,
    pub status: ConversionStatus,
    #[serde(default)]
    pub conversion_type: ConversionType,
    /// Unknown (false) until the service has inspected the content.
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_scanned_pdf: bool,
    /// Present iff `status` is `FAILED`.
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Conversion {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// OCR is only worth mentioning once a scanned PDF finished converting.
    pub fn ocr_applied(&self) -> bool {
        self.is_scanned_pdf && self.status == ConversionStatus::Completed
    }

    /// Gate for [`crate::pipeline::download`]: `Some` only when `COMPLETED`.
    pub fn completed(&self) -> Option<CompletedJob> {
        (self.status == ConversionStatus::Completed).then(|| CompletedJob(self.clone()))
    }
}

/// A [`Conversion`] known to be `COMPLETED`; the only thing a download accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob(Conversion);

impl CompletedJob {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn original_file_name(&self) -> &str {
        &self.0.original_file_name
    }

    pub fn conversion(&self) -> &Conversion {
        &self.0
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

/// The service may emit RFC 3339 stamps or naive ISO stamps (implicitly UTC).
mod timestamp {
    use super::*;

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn required<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'"))),
        }
    }
}
