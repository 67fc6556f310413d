//! Shared test helpers: a scripted, call-counting `ConversionApi`.

use crate::api::{ByteProgress, ConversionApi};
use crate::error::ClientError;
use crate::job::{Conversion, ConversionStatus, ConversionType};
use crate::pipeline::validate::PdfFile;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Build a job snapshot with the given id and status.
pub(crate) fn job(id: &str, status: ConversionStatus) -> Conversion {
    Conversion {
        id: id.to_string(),
        original_file_name: "Report.pdf".to_string(),
        file_size: 2 * 1024 * 1024,
        status,
        conversion_type: ConversionType::PdfToWord,
        is_scanned_pdf: false,
        error_message: (status == ConversionStatus::Failed).then(|| "Conversion failed".into()),
        created_at: Utc::now(),
        completed_at: status.is_terminal().then(Utc::now),
    }
}

/// A `FAILED` job carrying `message`.
pub(crate) fn failed_job(id: &str, message: &str) -> Conversion {
    Conversion {
        error_message: Some(message.to_string()),
        ..job(id, ConversionStatus::Failed)
    }
}

/// A small valid PDF.
pub(crate) fn pdf(size: usize) -> PdfFile {
    PdfFile::new("Report.pdf", Some("application/pdf"), vec![b'%'; size])
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallCounts {
    pub uploads: usize,
    pub gets: usize,
    pub downloads: usize,
    pub lists: usize,
    pub deletes: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.uploads + self.gets + self.downloads + self.lists + self.deletes
    }
}

/// Replays queued responses in order and counts every call.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    uploads: Mutex<VecDeque<Result<Conversion, ClientError>>>,
    upload_ticks: Mutex<Vec<(u64, Option<u64>)>>,
    statuses: Mutex<VecDeque<Result<Conversion, ClientError>>>,
    downloads: Mutex<VecDeque<Result<Bytes, ClientError>>>,
    /// When set, every status fetch waits for a permit before answering.
    get_gate: Option<Arc<Notify>>,
    /// When set, the upload waits for a permit before answering.
    upload_gate: Option<Arc<Notify>>,
    counts: Mutex<CallCounts>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(self, r: Result<Conversion, ClientError>) -> Self {
        self.uploads.lock().unwrap().push_back(r);
        self
    }

    pub fn with_upload_ticks(self, ticks: Vec<(u64, Option<u64>)>) -> Self {
        *self.upload_ticks.lock().unwrap() = ticks;
        self
    }

    pub fn with_status(self, r: Result<Conversion, ClientError>) -> Self {
        self.statuses.lock().unwrap().push_back(r);
        self
    }

    pub fn with_statuses(self, jobs: impl IntoIterator<Item = Conversion>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .extend(jobs.into_iter().map(Ok));
        self
    }

    pub fn with_download(self, r: Result<Bytes, ClientError>) -> Self {
        self.downloads.lock().unwrap().push_back(r);
        self
    }

    pub fn with_get_gate(mut self, gate: Arc<Notify>) -> Self {
        self.get_gate = Some(gate);
        self
    }

    pub fn with_upload_gate(mut self, gate: Arc<Notify>) -> Self {
        self.upload_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> CallCounts {
        *self.counts.lock().unwrap()
    }
}

#[async_trait]
impl ConversionApi for ScriptedApi {
    async fn create_conversion(
        &self,
        file: &PdfFile,
        on_bytes: ByteProgress,
    ) -> Result<Conversion, ClientError> {
        self.counts.lock().unwrap().uploads += 1;
        let ticks = self.upload_ticks.lock().unwrap().clone();
        if ticks.is_empty() {
            on_bytes(file.size(), Some(file.size()));
        }
        for (sent, total) in ticks {
            on_bytes(sent, total);
        }
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Internal("no scripted upload".into())))
    }

    async fn get_conversion(&self, _id: &str) -> Result<Conversion, ClientError> {
        self.counts.lock().unwrap().gets += 1;
        if let Some(gate) = &self.get_gate {
            gate.notified().await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Internal("no scripted status".into())))
    }

    async fn download_conversion(&self, _id: &str) -> Result<Bytes, ClientError> {
        self.counts.lock().unwrap().downloads += 1;
        self.downloads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Internal("no scripted download".into())))
    }

    async fn list_conversions(
        &self,
        _skip: u32,
        _limit: u32,
    ) -> Result<Vec<Conversion>, ClientError> {
        self.counts.lock().unwrap().lists += 1;
        Ok(Vec::new())
    }

    async fn delete_conversion(&self, _id: &str) -> Result<(), ClientError> {
        self.counts.lock().unwrap().deletes += 1;
        Ok(())
    }
}

/// Poll `cond` every few milliseconds until it holds or two seconds pass.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
