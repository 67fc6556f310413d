//! File validation: accept or reject a candidate PDF before any network call.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. type — declared MIME `application/pdf`, or a name ending in `.pdf`
//! 2. size — at most [`MAX_FILE_SIZE`]
//! 3. size — more than zero bytes
//!
//! Files above [`LARGE_FILE_THRESHOLD`] pass but carry an advisory.

use crate::classify::{ClassifiedError, ErrorKind};
use crate::error::ClientError;
use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// 50 MiB; above this a conversion is expected to take noticeably longer.
pub const LARGE_FILE_THRESHOLD: u64 = 50 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";

/// A file the user picked, held in memory.
#[derive(Debug, Clone)]
pub struct PdfFile {
    name: String,
    mime_type: Option<String>,
    size: u64,
    data: Bytes,
}

impl PdfFile {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            size: data.len() as u64,
            data,
        }
    }

    /// Load a file from disk.
    ///
    /// The MIME type is declared as `application/pdf` only when the content
    /// starts with the `%PDF` magic bytes. Files larger than
    /// [`MAX_FILE_SIZE`] are not read into memory: they keep their on-disk
    /// size and can only fail validation.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let read_err = |source| ClientError::FileRead {
            path: path.to_path_buf(),
            source,
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size = tokio::fs::metadata(path).await.map_err(read_err)?.len();

        if size > MAX_FILE_SIZE {
            debug!("{} is {} bytes; skipping read", path.display(), size);
            let mut magic = [0u8; 4];
            let mut f = tokio::fs::File::open(path).await.map_err(read_err)?;
            let is_pdf = f.read_exact(&mut magic).await.is_ok() && &magic == b"%PDF";
            return Ok(Self {
                name,
                mime_type: is_pdf.then(|| PDF_MIME.to_string()),
                size,
                data: Bytes::new(),
            });
        }

        let data = tokio::fs::read(path).await.map_err(read_err)?;
        let mime = data.starts_with(b"%PDF").then_some(PDF_MIME);
        debug!("Loaded {} ({} bytes, mime {:?})", path.display(), data.len(), mime);
        Ok(Self::new(name, mime, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// Above [`LARGE_FILE_THRESHOLD`]; non-blocking.
    pub large_file: bool,
}

impl ValidationReport {
    pub fn advisory(&self) -> Option<&'static str> {
        self.large_file
            .then_some("Large file detected. Conversion may take longer for files over 50MB.")
    }
}

/// Validate a candidate file.
pub fn validate(file: &PdfFile) -> Result<ValidationReport, ClassifiedError> {
    let declared_pdf = file.mime_type() == Some(PDF_MIME);
    let named_pdf = file.name().to_lowercase().ends_with(".pdf");
    if !declared_pdf && !named_pdf {
        return Err(ErrorKind::InvalidFileType
            .with_message("Invalid file type. Please upload a PDF file only."));
    }

    if file.size() > MAX_FILE_SIZE {
        return Err(ErrorKind::FileTooLarge.with_message(format!(
            "File too large. Maximum size is {}MB. Your file is {:.2}MB.",
            MAX_FILE_SIZE / 1024 / 1024,
            file.size() as f64 / 1024.0 / 1024.0
        )));
    }

    if file.size() == 0 {
        return Err(ErrorKind::EmptyFile.classified());
    }

    Ok(ValidationReport {
        large_file: file.size() > LARGE_FILE_THRESHOLD,
    })
}

/// Render a byte count as `"1.5 KB"`, `"2 MB"`, ….
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
