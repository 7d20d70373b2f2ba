//! Subcommand execution

use crate::config::{parse_task, TransformArgs, UploadArgs, ZipArgs};
use anyhow::Context;
use filestack_client::{FilestackClient, StorageOptions, UploadOptions, UploadRequest};
use serde_json::{json, Value};
use tracing::info;

/// Upload and report the stored file
pub async fn upload(client: &FilestackClient, args: &UploadArgs) -> anyhow::Result<Value> {
    let options = args
        .options
        .iter()
        .fold(UploadOptions::new(), |options, (k, v)| options.with(k, v));

    let mut request = UploadRequest::default()
        .multipart(!args.no_multipart)
        .intelligent(args.intelligent)
        .storage(&args.storage)
        .timeout(args.timeout())
        .options(options);
    if let Some(file) = &args.file {
        request = request.with_file(file);
    }
    if let Some(url) = &args.url {
        request = request.with_external_url(url);
    }

    let link = client.upload(request).await.context("upload failed")?;
    info!("Stored {}", link.handle());

    Ok(json!({
        "handle": link.handle(),
        "url": link.url(),
    }))
}

/// Zip stored files and report the archive
pub async fn zip(client: &FilestackClient, args: &ZipArgs) -> anyhow::Result<Value> {
    let storage: StorageOptions = args.storage.iter().cloned().collect();
    let result = client.zip(&args.files, &storage).await.context("zip failed")?;
    info!("Zipped {} files into {}", args.files.len(), result.handle);

    Ok(serde_json::to_value(result)?)
}

/// Build a processing URL without contacting the API
pub fn transform(client: &FilestackClient, args: &TransformArgs) -> anyhow::Result<Value> {
    let mut transform = client.transform_external(&args.url);
    for raw in &args.tasks {
        let (name, params) = parse_task(raw)?;
        transform = transform.task(&name, params);
    }

    Ok(json!({ "url": transform.url() }))
}
