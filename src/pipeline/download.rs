//! Download: fetch a finished document and save it next to its siblings.
//!
//! Only a [`CompletedJob`] can be downloaded, so asking for the artifact of a
//! job that is still running, or that failed, does not type-check.

use crate::api::ConversionApi;
use crate::classify::{classify_error, ClassifiedError};
use crate::error::ClientError;
use crate::job::CompletedJob;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Used when the original name has no usable stem.
const FALLBACK_STEM: &str = "document";

/// Map an uploaded file name to the name the document is saved under.
///
/// A trailing `.pdf` (any case) is replaced by `.docx`; anything else gets
/// `.docx` appended. Directory components are dropped.
///
/// ```
/// use pdf2docx::pipeline::download::docx_file_name;
///
/// assert_eq!(docx_file_name("Report.PDF"), "Report.docx");
/// assert_eq!(docx_file_name("notes"), "notes.docx");
/// ```
pub fn docx_file_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base.as_str(),
    };

    if stem.is_empty() {
        format!("{FALLBACK_STEM}.docx")
    } else {
        format!("{stem}.docx")
    }
}

/// Fetch `job`'s document and write it into `dir`.
///
/// Returns the path written. Failures are classified.
pub async fn download(
    api: &dyn ConversionApi,
    job: &CompletedJob,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ClassifiedError> {
    fetch_to(api, job, dir.as_ref()).await.map_err(|e| {
        warn!("Download of {} failed: {}", job.id(), e);
        classify_error(&e)
    })
}

async fn fetch_to(
    api: &dyn ConversionApi,
    job: &CompletedJob,
    dir: &Path,
) -> Result<PathBuf, ClientError> {
    let body = api.download_conversion(job.id()).await?;
    let path = dir.join(docx_file_name(job.original_file_name()));
    debug!("Fetched {} bytes for {}", body.len(), job.id());

    let len = body.len();
    let path = write_atomic(path, body).await?;
    info!("Saved {} ({} bytes)", path.display(), len);
    Ok(path)
}

/// Write `data` to a temporary file beside `path` and persist it over
/// `path`, so readers never observe a partial document.
///
/// The temporary file is removed if any step fails.
async fn write_atomic(path: PathBuf, data: Bytes) -> Result<PathBuf, ClientError> {
    tokio::task::spawn_blocking(move || -> Result<PathBuf, ClientError> {
        let write_err = |source| ClientError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".docx.part")
            .tempfile_in(dir)
            .map_err(write_err)?;
        tmp.write_all(&data).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(path)
    })
    .await
    .map_err(|e| ClientError::Internal(format!("write task: {e}")))?
}
