//! Common types for the client SDK

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Extra upload parameters, passed to the API as form fields unmodified
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadOptions {
    fields: Vec<(String, String)>,
}

impl UploadOptions {
    /// Create new empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option; a repeated key replaces the earlier value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parameters of a single upload call
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Local file to upload
    pub filepath: Option<PathBuf>,
    /// External URL for the service to fetch
    pub external_url: Option<String>,
    /// Use the multipart protocol for local files
    pub multipart: bool,
    /// Passed through to the API
    pub options: UploadOptions,
    /// Storage location (`s3`, `gcs`, `azure`, ...)
    pub storage: String,
    /// Use intelligent ingestion for multipart uploads
    pub intelligent: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for UploadRequest {
    fn default() -> Self {
        Self {
            filepath: None,
            external_url: None,
            multipart: true,
            options: UploadOptions::default(),
            storage: "s3".to_string(),
            intelligent: false,
            timeout: Duration::from_secs(60),
        }
    }
}

impl UploadRequest {
    /// Upload a local file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            filepath: Some(path.into()),
            ..Default::default()
        }
    }

    /// Store a file fetched from an external URL
    pub fn external(url: impl Into<String>) -> Self {
        Self {
            external_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(path.into());
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    pub fn multipart(mut self, multipart: bool) -> Self {
        self.multipart = multipart;
        self
    }

    pub fn options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = storage.into();
        self
    }

    pub fn intelligent(mut self, intelligent: bool) -> Self {
        self.intelligent = intelligent;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Body returned by the store and multipart complete endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    /// Store endpoint spelling of `mimetype`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Any other fields, kept as returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadResponse {
    /// The handle, falling back to the last segment of `url`
    pub fn resolved_handle(&self) -> Option<String> {
        self.handle
            .clone()
            .filter(|h| !h.is_empty())
            .or_else(|| self.url.as_deref().and_then(crate::zip::handle_from_url))
    }

    /// The MIME type under either of its field names
    pub fn resolved_mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref().or(self.file_type.as_deref())
    }
}

/// Ordered storage parameters for the zip endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageOptions {
    pairs: Vec<(String, String)>,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair; a repeated key replaces the earlier value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StorageOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |options, (k, v)| options.with(k, v))
    }
}

/// Result of a zip call: the response body with the handle merged in
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZipResult {
    pub handle: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
