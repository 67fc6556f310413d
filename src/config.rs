//! Configuration for talking to the conversion service.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share a config between the API client, the poller and the session, and
//! to log exactly what a run was configured with.

use crate::error::ClientError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Default service location, matching a locally started backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for a conversion client.
///
/// # Example
/// ```rust
/// use pdf2docx::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://convert.example.com")
///     .poll_interval_ms(1000)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint("/api/conversions/"), "https://convert.example.com/api/conversions/");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Service root, without a trailing slash. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Delay between the end of one status fetch and the start of the next. Default: 2000.
    ///
    /// The delay runs after each completed round-trip, so a slow service
    /// stretches the cadence instead of stacking overlapping requests.
    pub poll_interval_ms: u64,

    /// Whole-request timeout in seconds. Default: 300.
    ///
    /// Applies to uploads too, so it must cover a 100 MiB body on a slow link.
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Bytes per chunk fed to the upload body; progress ticks once per chunk. Default: 64 KiB.
    pub upload_chunk_size: usize,

    /// Observer for upload progress. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
            upload_chunk_size: 64 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("upload_chunk_size", &self.upload_chunk_size)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn UploadProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Join `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.upload_chunk_size = bytes.max(1024);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(ClientError::InvalidConfig("base URL must not be empty".into()));
        }
        if reqwest::Url::parse(&c.base_url).is_err() {
            return Err(ClientError::InvalidConfig(format!(
                "base URL '{}' is not a valid URL",
                c.base_url
            )));
        }
        if c.poll_interval_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "poll interval must be ≥ 1 ms".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request timeout must be ≥ 1 s".into(),
            ));
        }
        Ok(self.config)
    }
}
