//! Client configuration

use crate::{ClientError, Result};
use std::time::Duration;

/// Default REST API base (single-request store endpoint)
pub const DEFAULT_API_URL: &str = "https://www.filestackapi.com/api";
/// Default multipart upload API base
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.filestackapi.com";
/// Default processing API base (transformations, zip)
pub const DEFAULT_PROCESS_URL: &str = "https://process.filestackapi.com";
/// Default CDN base for stored files
pub const DEFAULT_CDN_URL: &str = "https://cdn.filestackcontent.com";

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// REST API base URL
    pub api_url: String,
    /// Multipart upload API base URL
    pub upload_url: String,
    /// Processing API base URL
    pub process_url: String,
    /// CDN base URL
    pub cdn_url: String,
    /// Request timeout for calls that do not take their own
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum retry attempts per multipart part
    pub max_retries: u32,
    /// Initial delay between retries, doubled on every attempt
    pub retry_backoff: Duration,
    /// Multipart part size (bytes)
    pub part_size: usize,
    /// Initial chunk size for intelligent ingestion (bytes)
    pub intelligent_chunk_size: usize,
    /// Number of parts uploaded concurrently
    pub upload_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            process_url: DEFAULT_PROCESS_URL.to_string(),
            cdn_url: DEFAULT_CDN_URL.to_string(),
            timeout: Duration::from_secs(60),
            user_agent: format!("filestack-rust/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 5,
            retry_backoff: Duration::from_millis(250),
            part_size: 8 * 1024 * 1024,              // 8 MB
            intelligent_chunk_size: 8 * 1024 * 1024, // 8 MB
            upload_concurrency: 4,
        }
    }
}

impl Config {
    /// Point every endpoint at a single base URL (useful for proxies and tests)
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/');
        self.api_url = format!("{}/api", base);
        self.upload_url = base.to_string();
        self.process_url = base.to_string();
        self.cdn_url = base.to_string();
        self
    }

    /// Set the processing API base URL
    pub fn with_process_url(mut self, url: impl Into<String>) -> Self {
        self.process_url = url.into();
        self
    }

    /// Set the multipart upload API base URL
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry policy for multipart parts
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Set multipart part size
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Set initial intelligent ingestion chunk size
    pub fn with_intelligent_chunk_size(mut self, chunk_size: usize) -> Self {
        self.intelligent_chunk_size = chunk_size;
        self
    }

    /// Set number of concurrent part uploads
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    /// Check the values the multipart helper depends on
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            return Err(ClientError::Config("part_size must be greater than zero".to_string()));
        }
        if self.intelligent_chunk_size == 0 {
            return Err(ClientError::Config(
                "intelligent_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.upload_concurrency == 0 {
            return Err(ClientError::Config(
                "upload_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
