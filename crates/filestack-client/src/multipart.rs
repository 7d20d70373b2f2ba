//! Multipart upload support for local files
//!
//! The protocol has three stages: `start` opens an upload session, every
//! part asks for a signed URL and is `PUT` there, and `complete` assembles the
//! parts into a stored file. Intelligent ingestion additionally sends each
//! part in offset chunks and commits parts individually.

use crate::{
    transport::{FormPart, HttpRequest, HttpResponse, HttpTransport},
    ClientError, Config, Result, Security, UploadOptions, UploadResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument, warn};

/// Smallest chunk intelligent ingestion falls back to
pub const MIN_INTELLIGENT_CHUNK_SIZE: usize = 32 * 1024;

/// A local file to upload. Contents are read on demand.
#[derive(Clone, Debug)]
pub(crate) struct FileInfo {
    pub path: PathBuf,
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
}

impl FileInfo {
    pub(crate) async fn open(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::InvalidArgument(format!("Not a file path: {}", path.display()))
            })?
            .to_string();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ClientError::InvalidArgument(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        let mimetype = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            mimetype,
            size: metadata.len(),
        })
    }

    /// Whole contents, for the single-request upload
    pub(crate) async fn read_all(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }

    /// `len` bytes starting at `offset`
    pub(crate) async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    uri: String,
    region: String,
    upload_id: String,
    location_url: String,
}

#[derive(Debug, Deserialize)]
struct PartUrlResponse {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

/// Upload session returned by `start`
#[derive(Clone, Debug)]
struct Session {
    uri: String,
    region: String,
    upload_id: String,
    /// Base URL for the remaining calls
    location: String,
}

/// Byte range of one part within the file
#[derive(Clone, Debug, PartialEq, Eq)]
struct PartJob {
    number: u32,
    offset: u64,
    len: usize,
}

#[derive(Clone, Debug)]
struct CompletedPart {
    number: u32,
    etag: Option<String>,
}

/// Parameters shared by every request of one upload
pub(crate) struct MultipartUpload<'a> {
    pub transport: &'a dyn HttpTransport,
    pub config: &'a Config,
    pub apikey: &'a str,
    pub security: Option<&'a Security>,
    pub options: &'a UploadOptions,
    pub storage: &'a str,
    pub intelligent: bool,
    pub timeout: Duration,
}

impl MultipartUpload<'_> {
    /// Run the whole protocol for one file
    #[instrument(skip_all, fields(filename = %file.filename, size = file.size, intelligent = self.intelligent))]
    pub(crate) async fn run(&self, file: &FileInfo) -> Result<UploadResponse> {
        self.config.validate()?;

        let session = self.start(file).await?;
        debug!(upload_id = %session.upload_id, "Multipart upload started");

        let jobs = split_parts(file.size, self.config.part_size);
        let total_parts = jobs.len();

        let mut parts: Vec<CompletedPart> = stream::iter(jobs)
            .map(|job| self.upload_part(&session, file, job))
            .buffer_unordered(self.config.upload_concurrency)
            .try_collect()
            .await?;
        parts.sort_by_key(|part| part.number);
        debug!(parts = total_parts, "All parts uploaded");

        self.complete(&session, file, &parts).await
    }

    async fn start(&self, file: &FileInfo) -> Result<Session> {
        let mut fields = vec![
            FormPart::text("apikey", self.apikey),
            FormPart::text("filename", &file.filename),
            FormPart::text("mimetype", &file.mimetype),
            FormPart::text("size", file.size.to_string()),
            FormPart::text("store_location", self.storage),
        ];
        if self.intelligent {
            fields.push(FormPart::text("multipart", "true"));
        }
        self.push_security(&mut fields);
        self.push_options(&mut fields);

        let url = format!("{}/multipart/start", self.config.upload_url.trim_end_matches('/'));
        let request = HttpRequest::post(url).form(fields).timeout(self.timeout);
        let response = expect_success(self.transport.send(request).await?)?;
        let start: StartResponse = response.json()?;

        Ok(Session {
            location: location_base(&start.location_url),
            uri: start.uri,
            region: start.region,
            upload_id: start.upload_id,
        })
    }

    async fn upload_part(&self, session: &Session, file: &FileInfo, job: PartJob) -> Result<CompletedPart> {
        let data = file.read_range(job.offset, job.len).await?;

        if self.intelligent {
            self.upload_intelligent_part(session, file, job.number, data).await?;
            return Ok(CompletedPart {
                number: job.number,
                etag: None,
            });
        }

        let etag = self
            .with_retries(job.number, || self.upload_chunk(session, job.number, None, data.clone()))
            .await?;
        debug!(part = job.number, "Part uploaded");

        Ok(CompletedPart {
            number: job.number,
            etag: Some(etag),
        })
    }

    /// Send a part as offset chunks, halving the chunk size when a chunk keeps failing
    async fn upload_intelligent_part(&self, session: &Session, file: &FileInfo, part: u32, data: Bytes) -> Result<()> {
        let mut chunk_size = self.config.intelligent_chunk_size;
        let mut offset = 0usize;

        while offset < data.len() || (offset == 0 && data.is_empty()) {
            let end = usize::min(offset + chunk_size, data.len());
            let chunk = data.slice(offset..end);

            let result = self
                .with_retries(part, || self.upload_chunk(session, part, Some(offset), chunk.clone()))
                .await;

            match result {
                Ok(_) => {
                    if data.is_empty() {
                        break;
                    }
                    offset = end;
                }
                Err(e) if gave_up_on_transient(&e) && chunk_size / 2 >= MIN_INTELLIGENT_CHUNK_SIZE => {
                    chunk_size /= 2;
                    warn!(part, offset, chunk_size, "Reducing chunk size after failure");
                }
                Err(e) => return Err(e),
            }
        }

        self.with_retries(part, || self.commit_part(session, file, part))
            .await
    }

    /// Ask for a signed URL, then `PUT` the bytes there. Returns the ETag.
    async fn upload_chunk(
        &self,
        session: &Session,
        part: u32,
        offset: Option<usize>,
        data: Bytes,
    ) -> Result<String> {
        let mut fields = self.session_fields(session);
        fields.extend([
            FormPart::text("part", part.to_string()),
            FormPart::text("size", data.len().to_string()),
            FormPart::text("md5", STANDARD.encode(Md5::digest(&data))),
            FormPart::text("store_location", self.storage),
        ]);
        if let Some(offset) = offset {
            fields.push(FormPart::text("offset", offset.to_string()));
            fields.push(FormPart::text("multipart", "true"));
        }

        let request = HttpRequest::post(format!("{}/multipart/upload", session.location))
            .form(fields)
            .timeout(self.timeout);
        let response = expect_success(self.transport.send(request).await?)?;
        let target: PartUrlResponse = response.json()?;

        let mut put = HttpRequest::put(target.url).bytes(data).timeout(self.timeout);
        for (name, value) in target.headers {
            put = put.header(name, value);
        }
        let response = expect_success(self.transport.send(put).await?)?;

        response
            .header("etag")
            .map(|etag| etag.trim_matches('"').to_string())
            .ok_or_else(|| ClientError::InvalidResponse(format!("Missing ETag for part {}", part)))
    }

    async fn commit_part(&self, session: &Session, file: &FileInfo, part: u32) -> Result<()> {
        let mut fields = self.session_fields(session);
        fields.extend([
            FormPart::text("size", file.size.to_string()),
            FormPart::text("part", part.to_string()),
            FormPart::text("store_location", self.storage),
        ]);

        let request = HttpRequest::post(format!("{}/multipart/commit", session.location))
            .form(fields)
            .timeout(self.timeout);
        expect_success(self.transport.send(request).await?)?;
        Ok(())
    }

    /// Finish the upload, polling while the service answers 202
    async fn complete(&self, session: &Session, file: &FileInfo, parts: &[CompletedPart]) -> Result<UploadResponse> {
        let mut fields = self.session_fields(session);
        fields.extend([
            FormPart::text("filename", &file.filename),
            FormPart::text("mimetype", &file.mimetype),
            FormPart::text("size", file.size.to_string()),
            FormPart::text("store_location", self.storage),
        ]);
        if self.intelligent {
            fields.push(FormPart::text("multipart", "true"));
        } else {
            fields.push(FormPart::text("parts", parts_field(parts)));
        }
        self.push_security(&mut fields);
        self.push_options(&mut fields);

        let request = HttpRequest::post(format!("{}/multipart/complete", session.location))
            .form(fields)
            .timeout(self.timeout);

        let mut polls = 0;
        loop {
            let response = self.transport.send(request.clone()).await?;
            if response.status == 202 {
                if polls >= self.config.max_retries {
                    return Err(ClientError::Upload {
                        status: response.status,
                        body: response.text(),
                    });
                }
                polls += 1;
                debug!(polls, "Upload still processing");
                tokio::time::sleep(self.backoff(polls)).await;
                continue;
            }
            return expect_success(response)?.json();
        }
    }

    /// Run `op`, retrying transient failures up to `max_retries` times.
    /// Other errors are returned as they are.
    async fn with_retries<T, F, Fut>(&self, part: u32, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempts <= self.config.max_retries => {
                    let delay = self.backoff(attempts);
                    warn!(part, attempts, error = %e, "Retrying part in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(ClientError::PartFailed {
                        part,
                        attempts,
                        source: Box::new(e),
                    })
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        self.config.retry_backoff.saturating_mul(factor)
    }

    fn session_fields(&self, session: &Session) -> Vec<FormPart> {
        vec![
            FormPart::text("apikey", self.apikey),
            FormPart::text("uri", &session.uri),
            FormPart::text("region", &session.region),
            FormPart::text("upload_id", &session.upload_id),
        ]
    }

    fn push_security(&self, fields: &mut Vec<FormPart>) {
        if let Some(security) = self.security {
            fields.extend(security.params().map(|(k, v)| FormPart::text(k, v)));
        }
    }

    fn push_options(&self, fields: &mut Vec<FormPart>) {
        fields.extend(self.options.iter().map(|(k, v)| FormPart::text(k, v)));
    }
}

/// Turn a non-2xx response into `ClientError::Upload`
pub(crate) fn expect_success(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Upload {
            status: response.status,
            body: response.text(),
        })
    }
}

/// Split into parts numbered from 1; an empty file still has one part
fn split_parts(size: u64, part_size: usize) -> Vec<PartJob> {
    if size == 0 {
        return vec![PartJob {
            number: 1,
            offset: 0,
            len: 0,
        }];
    }

    let step = part_size as u64;
    (0..size)
        .step_by(part_size)
        .zip(1u32..)
        .map(|(offset, number)| PartJob {
            number,
            offset,
            len: u64::min(step, size - offset) as usize,
        })
        .collect()
}

/// `1:etag;2:etag` in part order
fn parts_field(parts: &[CompletedPart]) -> String {
    parts
        .iter()
        .filter_map(|part| part.etag.as_ref().map(|etag| format!("{}:{}", part.number, etag)))
        .collect::<Vec<_>>()
        .join(";")
}

fn location_base(location_url: &str) -> String {
    let location = location_url.trim_end_matches('/');
    if location.contains("://") {
        location.to_string()
    } else {
        format!("https://{}", location)
    }
}

fn gave_up_on_transient(error: &ClientError) -> bool {
    matches!(error, ClientError::PartFailed { source, .. } if source.is_transient())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::FakeTransport;
    use crate::transport::{Body, Method};
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const START_BODY: &str =
        r#"{"uri":"/u/1","region":"us-east-1","upload_id":"UP1","location_url":"upload.test"}"#;

    fn test_config() -> Config {
        Config::default()
            .with_upload_url("https://upload.test")
            .with_part_size(4)
            .with_intelligent_chunk_size(4)
            .with_retries(2, Duration::ZERO)
    }

    /// File on disk; keep the guard alive for the duration of the test
    fn temp_file(data: &[u8]) -> (tempfile::NamedTempFile, FileInfo) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(data).unwrap();
        let file = FileInfo {
            path: tmp.path().to_path_buf(),
            filename: "notes.txt".to_string(),
            mimetype: "text/plain".to_string(),
            size: data.len() as u64,
        };
        (tmp, file)
    }

    fn put_body(request: &HttpRequest) -> &[u8] {
        match &request.body {
            Body::Bytes(data) => data,
            other => panic!("Expected a byte body, got {:?}", other),
        }
    }

    /// Happy-path service; `put_failures` makes the first N PUTs return 503
    fn service(put_failures: u32) -> FakeTransport {
        let failures = Arc::new(AtomicU32::new(put_failures));
        FakeTransport::new(move |req| {
            let url = req.url.as_str();
            let response = if url.ends_with("/multipart/start") {
                HttpResponse::new(200, START_BODY)
            } else if url.ends_with("/multipart/upload") {
                let part = req.form_value("part").unwrap_or("0");
                let offset = req.form_value("offset").unwrap_or("0");
                HttpResponse::new(
                    200,
                    format!(
                        r#"{{"url":"https://s3.test/p{}-{}","headers":{{"Authorization":"sig"}}}}"#,
                        part, offset
                    ),
                )
            } else if req.method == Method::Put {
                if failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    HttpResponse::new(503, "slow down")
                } else {
                    let tag = url.rsplit('/').next().unwrap_or_default().to_string();
                    HttpResponse::new(200, "").with_header("ETag", format!("\"{}\"", tag))
                }
            } else if url.ends_with("/multipart/commit") {
                HttpResponse::new(200, "")
            } else if url.ends_with("/multipart/complete") {
                HttpResponse::new(200, r#"{"handle":"FINAL","url":"https://cdn.test/FINAL"}"#)
            } else {
                HttpResponse::new(404, "unknown")
            };
            Ok(response)
        })
    }

    fn upload<'a>(
        transport: &'a FakeTransport,
        config: &'a Config,
        options: &'a UploadOptions,
        intelligent: bool,
    ) -> MultipartUpload<'a> {
        MultipartUpload {
            transport,
            config,
            apikey: "KEY",
            security: None,
            options,
            storage: "s3",
            intelligent,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_split_parts() {
        let parts = split_parts(10, 4);
        let ranges: Vec<_> = parts.iter().map(|p| (p.number, p.offset, p.len)).collect();
        assert_eq!(ranges, vec![(1, 0, 4), (2, 4, 4), (3, 8, 2)]);

        let empty = split_parts(0, 4);
        assert_eq!(empty, vec![PartJob { number: 1, offset: 0, len: 0 }]);
    }

    #[tokio::test]
    async fn test_file_info_reads_ranges_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"0123456789").unwrap();

        let file = FileInfo::open(&path).await.unwrap();
        assert_eq!(file.filename, "photo.png");
        assert_eq!(file.mimetype, "image/png");
        assert_eq!(file.size, 10);
        assert_eq!(&file.read_range(4, 4).await.unwrap()[..], b"4567");
        assert_eq!(&file.read_range(8, 2).await.unwrap()[..], b"89");
        assert!(file.read_range(8, 4).await.is_err());

        let err = FileInfo::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[test]
    fn test_parts_field_and_location() {
        let parts = vec![
            CompletedPart { number: 1, etag: Some("a".to_string()) },
            CompletedPart { number: 2, etag: Some("b".to_string()) },
        ];
        assert_eq!(parts_field(&parts), "1:a;2:b");
        assert_eq!(location_base("upload-eu.filestackapi.com"), "https://upload-eu.filestackapi.com");
        assert_eq!(location_base("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_regular_upload_completes_with_ordered_parts() {
        let transport = service(0);
        let config = test_config();
        let options = UploadOptions::new().with("path", "/docs/");
        let (_guard, file) = temp_file(b"0123456789");

        let response = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap();
        assert_eq!(response.resolved_handle().as_deref(), Some("FINAL"));

        let requests = transport.requests();
        let start = &requests[0];
        assert!(start.url.ends_with("/multipart/start"));
        assert_eq!(start.form_value("size"), Some("10"));
        assert_eq!(start.form_value("path"), Some("/docs/"));

        let puts: Vec<_> = requests.iter().filter(|r| r.method == Method::Put).collect();
        assert_eq!(puts.len(), 3);
        assert!(puts.iter().all(|p| p.headers.contains(&("Authorization".to_string(), "sig".to_string()))));

        let complete = requests.last().unwrap();
        assert_eq!(complete.url, "https://upload.test/multipart/complete");
        assert_eq!(complete.form_value("parts"), Some("1:p1-0;2:p2-0;3:p3-0"));
        assert_eq!(complete.form_value("path"), Some("/docs/"));
    }

    #[tokio::test]
    async fn test_part_md5_is_base64_digest() {
        let transport = service(0);
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"abcd");

        upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap();

        let part_request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.ends_with("/multipart/upload"))
            .unwrap();
        assert_eq!(part_request.form_value("md5"), Some("4vxxTEcn7pOV8yTNLn8zHw=="));
    }

    #[tokio::test]
    async fn test_transient_part_failure_is_retried() {
        let transport = service(2);
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"abcd");

        let response = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap();
        assert_eq!(response.handle.as_deref(), Some("FINAL"));

        let puts = transport.requests().iter().filter(|r| r.method == Method::Put).count();
        assert_eq!(puts, 3);
    }

    #[tokio::test]
    async fn test_part_exhausting_retries_fails_upload() {
        let transport = service(u32::MAX);
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"abcd");

        let err = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap_err();

        match err {
            ClientError::PartFailed { part, attempts, .. } => {
                assert_eq!(part, 1);
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected PartFailed, got {:?}", other),
        }
        assert!(!transport.requests().iter().any(|r| r.url.ends_with("/multipart/complete")));
    }

    #[tokio::test]
    async fn test_start_failure_is_upload_error() {
        let transport = FakeTransport::fixed(403, r#"{"error":"forbidden"}"#);
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"abcd");

        let err = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Upload { status: 403, .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_part_is_upload_error_without_retry() {
        let transport = FakeTransport::new(|req| {
            Ok(if req.url.ends_with("/multipart/start") {
                HttpResponse::new(200, START_BODY)
            } else {
                HttpResponse::new(400, "bad part")
            })
        });
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"abcd");

        let err = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap_err();

        match &err {
            ClientError::Upload { status, body } => {
                assert_eq!(*status, 400);
                assert_eq!(body, "bad part");
            }
            other => panic!("Expected Upload, got {:?}", other),
        }
        // start plus a single upload-url request
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_parts_are_read_from_their_offsets() {
        let transport = service(0);
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"0123456789");

        upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap();

        let mut puts: Vec<_> = transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::Put)
            .map(|r| (r.url.clone(), put_body(r).to_vec()))
            .collect();
        puts.sort();
        assert_eq!(
            puts,
            vec![
                ("https://s3.test/p1-0".to_string(), b"0123".to_vec()),
                ("https://s3.test/p2-0".to_string(), b"4567".to_vec()),
                ("https://s3.test/p3-0".to_string(), b"89".to_vec()),
            ]
        );
    }

    /// Intelligent-ingestion service whose PUTs fail with 503 above `limit` bytes
    fn size_limited_service(limit: usize) -> FakeTransport {
        FakeTransport::new(move |req| {
            let url = req.url.as_str();
            Ok(if url.ends_with("/multipart/start") {
                HttpResponse::new(200, START_BODY)
            } else if url.ends_with("/multipart/upload") {
                HttpResponse::new(200, r#"{"url":"https://s3.test/chunk","headers":{}}"#)
            } else if req.method == Method::Put {
                if put_body(req).len() > limit {
                    HttpResponse::new(503, "too large")
                } else {
                    HttpResponse::new(200, "").with_header("ETag", "\"chunk\"")
                }
            } else if url.ends_with("/multipart/commit") {
                HttpResponse::new(200, "")
            } else {
                HttpResponse::new(200, r#"{"handle":"SMALL"}"#)
            })
        })
    }

    fn chunk_requests(transport: &FakeTransport) -> Vec<(String, String)> {
        transport
            .requests()
            .iter()
            .filter(|r| r.url.ends_with("/multipart/upload"))
            .map(|r| {
                (
                    r.form_value("offset").unwrap().to_string(),
                    r.form_value("size").unwrap().to_string(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_intelligent_chunk_size_is_halved_after_failures() {
        let transport = size_limited_service(MIN_INTELLIGENT_CHUNK_SIZE);
        let config = test_config()
            .with_part_size(100 * 1024)
            .with_intelligent_chunk_size(64 * 1024)
            .with_retries(1, Duration::ZERO);
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(&vec![7u8; 100 * 1024]);

        let response = upload(&transport, &config, &options, true)
            .run(&file)
            .await
            .unwrap();
        assert_eq!(response.handle.as_deref(), Some("SMALL"));

        let chunks = chunk_requests(&transport);
        let offsets: Vec<_> = chunks.iter().map(|(offset, _)| offset.as_str()).collect();
        assert_eq!(offsets, vec!["0", "0", "0", "32768", "65536", "98304"]);
        let sizes: Vec<_> = chunks.iter().map(|(_, size)| size.as_str()).collect();
        assert_eq!(sizes, vec!["65536", "65536", "32768", "32768", "32768", "4096"]);

        let commits = transport
            .requests()
            .iter()
            .filter(|r| r.url.ends_with("/multipart/commit"))
            .count();
        assert_eq!(commits, 1);
    }

    #[tokio::test]
    async fn test_intelligent_chunk_never_shrinks_below_minimum() {
        let transport = size_limited_service(MIN_INTELLIGENT_CHUNK_SIZE / 2);
        let config = test_config()
            .with_part_size(100 * 1024)
            .with_intelligent_chunk_size(64 * 1024)
            .with_retries(1, Duration::ZERO);
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(&vec![7u8; 100 * 1024]);

        let err = upload(&transport, &config, &options, true)
            .run(&file)
            .await
            .unwrap_err();

        match &err {
            ClientError::PartFailed { part, attempts, .. } => {
                assert_eq!(*part, 1);
                assert_eq!(*attempts, 2);
            }
            other => panic!("Expected PartFailed, got {:?}", other),
        }
        assert_eq!(err.status(), Some(503));

        let sizes: Vec<_> = chunk_requests(&transport).into_iter().map(|(_, size)| size).collect();
        assert_eq!(sizes, vec!["65536", "65536", "32768", "32768"]);
        assert!(!transport
            .requests()
            .iter()
            .any(|r| r.url.ends_with("/multipart/commit") || r.url.ends_with("/multipart/complete")));
    }

    #[tokio::test]
    async fn test_intelligent_upload_commits_each_part() {
        let transport = service(0);
        let config = test_config().with_part_size(8);
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"0123456789");

        upload(&transport, &config, &options, true)
            .run(&file)
            .await
            .unwrap();

        let requests = transport.requests();
        let offsets: Vec<_> = requests
            .iter()
            .filter(|r| r.url.ends_with("/multipart/upload"))
            .map(|r| (r.form_value("part").unwrap().to_string(), r.form_value("offset").unwrap().to_string()))
            .collect();
        assert_eq!(offsets.len(), 3);
        assert!(offsets.contains(&("1".to_string(), "0".to_string())));
        assert!(offsets.contains(&("1".to_string(), "4".to_string())));
        assert!(offsets.contains(&("2".to_string(), "0".to_string())));

        let commits = requests.iter().filter(|r| r.url.ends_with("/multipart/commit")).count();
        assert_eq!(commits, 2);

        let complete = requests.last().unwrap();
        assert_eq!(complete.form_value("multipart"), Some("true"));
        assert_eq!(complete.form_value("parts"), None);
    }

    #[tokio::test]
    async fn test_complete_polls_while_processing() {
        let polls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&polls);
        let transport = FakeTransport::new(move |req| {
            let url = req.url.as_str();
            Ok(if url.ends_with("/multipart/start") {
                HttpResponse::new(200, START_BODY)
            } else if url.ends_with("/multipart/upload") {
                HttpResponse::new(200, r#"{"url":"https://s3.test/p","headers":{}}"#)
            } else if req.method == Method::Put {
                HttpResponse::new(200, "").with_header("ETag", "e1")
            } else if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                HttpResponse::new(202, "")
            } else {
                HttpResponse::new(200, r#"{"handle":"LATE"}"#)
            })
        });
        let config = test_config();
        let options = UploadOptions::new();
        let (_guard, file) = temp_file(b"ab");

        let response = upload(&transport, &config, &options, false)
            .run(&file)
            .await
            .unwrap();
        assert_eq!(response.handle.as_deref(), Some("LATE"));
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }
}
