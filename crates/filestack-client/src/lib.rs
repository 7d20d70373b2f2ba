//! # Filestack Client SDK
//!
//! A client SDK for the Filestack file upload and processing API.
//!
//! ## Features
//!
//! - **Uploads**: Local files (multipart, with optional intelligent ingestion) or external URLs
//! - **Security**: Signed policies for secured applications
//! - **Transformations**: Processing URL chains for stored or external files
//! - **Zip**: Bundle stored files into a new archive
//!
//! ## Example
//!
//! ```rust,ignore
//! use filestack_client::{FilestackClient, StorageOptions, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = FilestackClient::new("YOUR_API_KEY")?;
//!
//!     // Upload a local file
//!     let link = client.upload(UploadRequest::file("photo.jpg")).await?;
//!     println!("Stored at {}", link.url());
//!
//!     // Zip stored files
//!     let storage = StorageOptions::new().with("location", "s3");
//!     let zipped = client.zip(&[link.handle()], &storage).await?;
//!     println!("Archive handle: {}", zipped.handle);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod filelink;
mod multipart;
mod security;
mod types;

pub mod transport;
pub mod zip;

pub use client::FilestackClient;
pub use config::{Config, DEFAULT_API_URL, DEFAULT_CDN_URL, DEFAULT_PROCESS_URL, DEFAULT_UPLOAD_URL};
pub use error::{ClientError, Result};
pub use filelink::{Filelink, Transform, TransformSource};
pub use multipart::MIN_INTELLIGENT_CHUNK_SIZE;
pub use security::{Policy, Security};
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::*;
pub use zip::{encode_zip_files, handle_from_url};
