//! Client error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid combination of call arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-success status from an upload endpoint
    #[error("Upload failed ({status}): {body}")]
    Upload { status: u16, body: String },

    /// Non-200 status from the zip endpoint
    #[error("Zip failed ({status}): {body}")]
    Zip { status: u16, body: String },

    /// Timeout or connection failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A multipart part exhausted its retries
    #[error("Part {part} failed after {attempts} attempts: {source}")]
    PartFailed {
        part: u32,
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// Invalid response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Policy signing error
    #[error("Security error: {0}")]
    Security(String),
}

impl ClientError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upload { status, .. } | Self::Zip { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::PartFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Raw response body returned by the service, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Upload { body, .. } | Self::Zip { body, .. } => Some(body),
            Self::PartFailed { source, .. } => source.body(),
            _ => None,
        }
    }

    /// Check if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Upload { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}
