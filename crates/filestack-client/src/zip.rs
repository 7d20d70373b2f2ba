//! Zip URL construction
//!
//! The processing API expects the file list as JSON with quotes dropped and
//! only the brackets percent-encoded. This is not general URL encoding: any
//! other character (commas, colons, slashes) is sent literally.

use crate::{Result, StorageOptions};

/// Encode a file list for the zip path segment.
///
/// `["a","b"]` becomes `%5Ba,b%5D`.
pub fn encode_zip_files<S: AsRef<str>>(files: &[S]) -> Result<String> {
    let files: Vec<&str> = files.iter().map(AsRef::as_ref).collect();
    let json = serde_json::to_string(&files)?;
    Ok(json.replace('"', "").replace('[', "%5B").replace(']', "%5D"))
}

/// Format storage options as `key:value` pairs joined by commas
pub fn storage_segment(storage: &StorageOptions) -> String {
    storage
        .iter()
        .map(|(key, value)| format!("{}:{}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Full zip URL: `{process_url}/zip/store={storage}/{files}`
pub fn zip_url<S: AsRef<str>>(
    process_url: &str,
    files: &[S],
    storage: &StorageOptions,
) -> Result<String> {
    Ok([
        process_url.trim_end_matches('/').to_string(),
        "zip".to_string(),
        format!("store={}", storage_segment(storage)),
        encode_zip_files(files)?,
    ]
    .join("/"))
}

/// Last non-empty `/` segment of a URL
pub fn handle_from_url(url: &str) -> Option<String> {
    url.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}
