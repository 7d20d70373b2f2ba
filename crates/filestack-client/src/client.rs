//! Main client implementation

use crate::{
    multipart::{expect_success, FileInfo, MultipartUpload},
    transport::{FormPart, HttpRequest, HttpTransport, ReqwestTransport},
    zip::{handle_from_url, zip_url},
    ClientError, Config, Filelink, Result, Security, StorageOptions, Transform, UploadRequest,
    UploadResponse, ZipResult,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Filestack client
///
/// Holds only configuration, so one instance can serve any number of
/// concurrent calls.
pub struct FilestackClient {
    apikey: String,
    security: Option<Security>,
    config: Config,
    transport: Arc<dyn HttpTransport>,
}

enum UploadSource<'a> {
    File(FileInfo),
    Url(&'a str),
}

impl FilestackClient {
    /// Create a client with the default configuration
    pub fn new(apikey: impl Into<String>) -> Result<Self> {
        Self::with_config(apikey, Config::default())
    }

    /// Create a client with a custom configuration
    pub fn with_config(apikey: impl Into<String>, config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(apikey, config, Arc::new(transport))
    }

    /// Create a client that sends every request through `transport`
    pub fn with_transport(
        apikey: impl Into<String>,
        config: Config,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let apikey = apikey.into();
        if apikey.trim().is_empty() {
            return Err(ClientError::InvalidArgument("API key must not be empty".to_string()));
        }

        Ok(Self {
            apikey,
            security: None,
            config,
            transport,
        })
    }

    /// Sign every request with a policy
    pub fn with_security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    pub fn apikey(&self) -> &str {
        &self.apikey
    }

    pub fn security(&self) -> Option<&Security> {
        self.security.as_ref()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filelink for an already stored handle
    pub fn filelink(&self, handle: impl Into<String>) -> Filelink {
        Filelink::new(handle, &self.apikey, self.security.clone(), &self.config)
    }

    /// Upload a local file or store an external URL
    #[instrument(skip(self, request), fields(storage = %request.storage, multipart = request.multipart))]
    pub async fn upload(&self, request: UploadRequest) -> Result<Filelink> {
        let response = match (&request.filepath, &request.external_url) {
            (Some(_), Some(_)) => {
                return Err(ClientError::InvalidArgument(
                    "Cannot upload a file and an external URL at the same time".to_string(),
                ))
            }
            (None, None) => {
                return Err(ClientError::InvalidArgument(
                    "Either a file path or an external URL is required".to_string(),
                ))
            }
            (Some(path), None) if request.multipart => {
                let file = FileInfo::open(path).await?;
                MultipartUpload {
                    transport: self.transport.as_ref(),
                    config: &self.config,
                    apikey: &self.apikey,
                    security: self.security.as_ref(),
                    options: &request.options,
                    storage: &request.storage,
                    intelligent: request.intelligent,
                    timeout: request.timeout,
                }
                .run(&file)
                .await?
            }
            (Some(path), None) => {
                let file = FileInfo::open(path).await?;
                self.send_upload(UploadSource::File(file), &request).await?
            }
            (None, Some(url)) => self.send_upload(UploadSource::Url(url), &request).await?,
        };

        let handle = response.resolved_handle().ok_or_else(|| {
            ClientError::InvalidResponse("Upload response carries no handle".to_string())
        })?;
        info!(handle = %handle, "File stored");

        Ok(self.filelink(handle))
    }

    /// Start a transformation chain on an external URL
    pub fn transform_external(&self, url: impl Into<String>) -> Transform {
        Transform::external(url, &self.apikey, self.security.clone(), &self.config)
    }

    /// Zip stored files into a new stored archive
    #[instrument(skip(self, files, storage), fields(files = files.len()))]
    pub async fn zip<S: AsRef<str>>(&self, files: &[S], storage: &StorageOptions) -> Result<ZipResult> {
        let url = zip_url(&self.config.process_url, files, storage)?;
        let request = HttpRequest::get(url).timeout(self.config.timeout);

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            return Err(ClientError::Zip {
                status: response.status,
                body: response.text(),
            });
        }

        let mut body: Map<String, Value> = response.json()?;
        let url = match body.remove("url") {
            Some(Value::String(url)) => url,
            _ => {
                return Err(ClientError::InvalidResponse(
                    "Zip response carries no url".to_string(),
                ))
            }
        };
        let handle = handle_from_url(&url)
            .ok_or_else(|| ClientError::InvalidResponse(format!("No handle in zip url: {}", url)))?;
        body.remove("handle");
        debug!(handle = %handle, "Zip stored");

        Ok(ZipResult {
            handle,
            url,
            extra: body,
        })
    }

    // ==================== Helper Methods ====================

    /// Single-request upload through the store endpoint
    async fn send_upload(&self, source: UploadSource<'_>, request: &UploadRequest) -> Result<UploadResponse> {
        let url = format!(
            "{}/store/{}",
            self.config.api_url.trim_end_matches('/'),
            request.storage.to_uppercase()
        );

        let mut fields = vec![
            FormPart::text("apikey", &self.apikey),
            FormPart::text("store_location", &request.storage),
        ];
        if let Some(security) = &self.security {
            fields.extend(security.params().map(|(k, v)| FormPart::text(k, v)));
        }
        fields.extend(request.options.iter().map(|(k, v)| FormPart::text(k, v)));
        fields.push(match source {
            UploadSource::File(file) => FormPart::File {
                name: "fileUpload".to_string(),
                data: file.read_all().await?,
                filename: file.filename,
                mime: file.mimetype,
            },
            UploadSource::Url(url) => FormPart::text("url", url),
        });

        let request = HttpRequest::post(url).form(fields).timeout(request.timeout);
        let response = expect_success(self.transport.send(request).await?)?;
        response.json()
    }
}

impl fmt::Debug for FilestackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilestackClient")
            .field("apikey", &self.apikey)
            .field("secured", &self.security.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
