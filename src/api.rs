//! HTTP contract with the remote conversion service.
//!
//! [`ConversionApi`] is the seam between the orchestration logic and the
//! network: the poller, the session and the download stage only ever talk to
//! `Arc<dyn ConversionApi>`, so tests can script responses and count calls
//! without a server. [`HttpConversionApi`] is the real implementation on top
//! of `reqwest`.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create    | `POST /api/conversions/` (multipart, field `file`) |
//! | get       | `GET /api/conversions/{id}/` |
//! | download  | `GET /api/conversions/{id}/download/` |
//! | list      | `GET /api/conversions/?skip=&limit=` |
//! | delete    | `DELETE /api/conversions/{id}/` |

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::job::Conversion;
use crate::pipeline::validate::PdfFile;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Receives `(bytes_sent, total_bytes)` as the upload body is consumed.
///
/// `total_bytes` is `None` when the size is not known up front.
pub type ByteProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Default page size for [`ConversionApi::list_conversions`].
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Operations offered by the conversion service.
#[async_trait]
pub trait ConversionApi: Send + Sync {
    /// Submit `file` and return the created job (status `PENDING`).
    async fn create_conversion(
        &self,
        file: &PdfFile,
        on_bytes: ByteProgress,
    ) -> Result<Conversion, ClientError>;

    /// Fetch the current snapshot of job `id`.
    async fn get_conversion(&self, id: &str) -> Result<Conversion, ClientError>;

    /// Fetch the converted DOCX body of job `id`.
    async fn download_conversion(&self, id: &str) -> Result<Bytes, ClientError>;

    /// List jobs, newest first as ordered by the service.
    async fn list_conversions(&self, skip: u32, limit: u32)
        -> Result<Vec<Conversion>, ClientError>;

    /// Delete the record of job `id`.
    async fn delete_conversion(&self, id: &str) -> Result<(), ClientError>;
}

/// [`ConversionApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConversionApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpConversionApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("pdf2docx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn job_url(&self, id: &str) -> String {
        self.config.endpoint(&format!("/api/conversions/{id}/"))
    }

    fn transport_err(&self, url: &str, e: reqwest::Error) -> ClientError {
        ClientError::from_reqwest(url, self.config.request_timeout_secs, e)
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_err(url, e))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(url, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ConversionApi for HttpConversionApi {
    async fn create_conversion(
        &self,
        file: &PdfFile,
        on_bytes: ByteProgress,
    ) -> Result<Conversion, ClientError> {
        let url = self.config.endpoint("/api/conversions/");
        let total = file.size();
        info!("Uploading '{}' ({} bytes) to {}", file.name(), total, url);

        let data = file.bytes().clone();
        let chunk = self.config.upload_chunk_size.max(1);
        // Each chunk is reported as it is handed to the connection.
        let body = stream::iter((0..data.len()).step_by(chunk)).map(move |start| {
            let end = (start + chunk).min(data.len());
            on_bytes(end as u64, Some(total));
            Ok::<Bytes, std::io::Error>(data.slice(start..end))
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type().unwrap_or("application/pdf"))
            .map_err(|e| ClientError::Internal(format!("invalid MIME type: {e}")))?;
        let form = Form::new().part("file", part);

        let job: Conversion = self
            .get_json(&url, self.client.post(&url).multipart(form))
            .await?;
        info!("Created conversion {} ({})", job.id, job.status);
        Ok(job)
    }

    async fn get_conversion(&self, id: &str) -> Result<Conversion, ClientError> {
        let url = self.job_url(id);
        let job: Conversion = self.get_json(&url, self.client.get(&url)).await?;
        debug!("Conversion {} is {}", job.id, job.status);
        Ok(job)
    }

    async fn download_conversion(&self, id: &str) -> Result<Bytes, ClientError> {
        let url = self.config.endpoint(&format!("/api/conversions/{id}/download/"));
        let response = self.send(&url, self.client.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_err(&url, e))?;
        info!("Downloaded {} bytes for conversion {}", bytes.len(), id);
        Ok(bytes)
    }

    async fn list_conversions(
        &self,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<Conversion>, ClientError> {
        let url = self.config.endpoint("/api/conversions/");
        let request = self
            .client
            .get(&url)
            .query(&[("skip", skip), ("limit", limit)]);
        self.get_json(&url, request).await
    }

    async fn delete_conversion(&self, id: &str) -> Result<(), ClientError> {
        let url = self.job_url(id);
        self.send(&url, self.client.delete(&url)).await?;
        info!("Deleted conversion {}", id);
        Ok(())
    }
}

/// Turn a non-2xx response into [`ClientError::Http`], keeping the detail text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    debug!("HTTP {} with detail {:?}", status, detail);
    Err(ClientError::Http {
        status: status.as_u16(),
        detail,
    })
}

/// Pull the human-readable text out of an error body.
///
/// Accepts `{"detail": "..."}`, `{"message": "..."}` and validation-style
/// `{"detail": [{"msg": "..."}, ...]}` payloads.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(Value::as_str))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn job_json(id: &str, status: &str) -> Value {
        serde_json::json!({
            "id": id,
            "original_file_name": "Report.pdf",
            "file_size": 4096,
            "status": status,
            "conversion_type": "PDF_TO_WORD",
            "is_scanned_pdf": false,
            "error_message": null,
            "created_at": "2024-05-01T10:00:00",
            "completed_at": null
        })
    }

    fn api_for(server: &MockServer) -> HttpConversionApi {
        let config = ClientConfig::builder()
            .base_url(server.uri())
            .upload_chunk_size(1024)
            .request_timeout_secs(5)
            .build()
            .unwrap();
        HttpConversionApi::new(&config).unwrap()
    }

    #[test]
    fn detail_extraction() {
        assert_eq!(
            extract_detail(r#"{"detail":"Invalid file type"}"#).as_deref(),
            Some("Invalid file type")
        );
        assert_eq!(
            extract_detail(r#"{"message":"Too big"}"#).as_deref(),
            Some("Too big")
        );
        assert_eq!(
            extract_detail(r#"{"detail":[{"msg":"field required"},{"msg":"bad size"}]}"#)
                .as_deref(),
            Some("field required; bad size")
        );
        assert_eq!(extract_detail("<html>oops</html>"), None);
        assert_eq!(extract_detail(r#"{"detail":""}"#), None);
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_reports_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversions/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(job_json("j1", "PENDING")))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let file = PdfFile::new("Report.pdf", Some("application/pdf"), vec![b'x'; 4096]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_bytes: ByteProgress = Arc::new(move |sent, total| {
            sink.lock().unwrap().push((sent, total));
        });

        let job = api.create_conversion(&file, on_bytes).await.unwrap();
        assert_eq!(job.id, "j1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(*seen.last().unwrap(), (4096, Some(4096)));

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"Report.pdf\""));
        assert!(body.contains("application/pdf"));
    }

    #[tokio::test]
    async fn error_status_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversions/missing/"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"detail": "Conversion not found"})),
            )
            .mount(&server)
            .await;

        let err = api_for(&server).get_conversion("missing").await.unwrap_err();
        match err {
            ClientError::Http { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail.as_deref(), Some("Conversion not found"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversions/j1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = api_for(&server).get_conversion("j1").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn list_passes_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversions/"))
            .and(query_param("skip", "10"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                job_json("a", "COMPLETED"),
                job_json("b", "PENDING")
            ])))
            .mount(&server)
            .await;

        let jobs = api_for(&server).list_conversions(10, 5).await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_and_download() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/conversions/j1/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversions/j1/download/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04docx".to_vec()))
            .mount(&server)
            .await;

        let api = api_for(&server);
        api.delete_conversion("j1").await.unwrap();
        let body = api.download_conversion("j1").await.unwrap();
        assert_eq!(&body[..], b"PK\x03\x04docx");
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        // Bind then drop to obtain a port with nothing listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ClientConfig::builder()
            .base_url(format!("http://127.0.0.1:{port}"))
            .build()
            .unwrap();
        let err = HttpConversionApi::new(&config)
            .unwrap()
            .get_conversion("j1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network { .. }), "got {err:?}");
    }
}
