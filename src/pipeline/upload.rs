//! Upload: submit a validated file and turn byte counts into percentages.
//!
//! The API layer reports raw `(bytes_sent, total)` pairs; this stage derives
//! `round(bytes_sent * 100 / total)` and only forwards values that move
//! forward, so observers see a non-decreasing sequence in `0..=100` even if
//! the transport reports the same offset twice. Without a known total no
//! percentage is ever reported.
//!
//! Failures are returned as-is: the upload is never retried here.

use crate::api::{ByteProgress, ConversionApi};
use crate::error::ClientError;
use crate::job::{Conversion, ConversionStatus};
use crate::pipeline::validate::PdfFile;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// `round(sent * 100 / total)`, clamped to 100; `None` when `total` is zero.
pub fn percent(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let sent = u128::from(sent.min(total));
    let total = u128::from(total);
    Some(((sent * 200 + total) / (2 * total)) as u8)
}

/// Forwards a percentage only when it exceeds everything forwarded before.
struct MonotonicPercent<F> {
    // 0 = nothing emitted yet, otherwise last percent + 1.
    last: AtomicU8,
    emit: F,
}

impl<F: Fn(u8)> MonotonicPercent<F> {
    fn offer(&self, p: u8) {
        let tagged = p.min(100) + 1;
        let prev = self.last.fetch_max(tagged, Ordering::SeqCst);
        if tagged > prev {
            (self.emit)(tagged - 1);
        }
    }
}

/// Submit `file`, calling `on_progress` with non-decreasing percentages.
pub async fn upload<F>(
    api: &dyn ConversionApi,
    file: &PdfFile,
    on_progress: F,
) -> Result<Conversion, ClientError>
where
    F: Fn(u8) + Send + Sync + 'static,
{
    let tracker = Arc::new(MonotonicPercent {
        last: AtomicU8::new(0),
        emit: on_progress,
    });

    let on_bytes: ByteProgress = {
        let tracker = Arc::clone(&tracker);
        Arc::new(move |sent, total| {
            if let Some(p) = total.and_then(|t| percent(sent, t)) {
                tracker.offer(p);
            }
        })
    };

    let job = api.create_conversion(file, on_bytes).await?;
    if job.status != ConversionStatus::Pending {
        warn!(
            "Conversion {} was created with status {} instead of PENDING",
            job.id, job.status
        );
    }
    info!("Upload of '{}' accepted as job {}", file.name(), job.id);
    Ok(job)
}
