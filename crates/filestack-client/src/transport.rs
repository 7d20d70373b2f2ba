//! HTTP transport used by the client and the multipart helper
//!
//! Every network call goes through [`HttpTransport`], so tests can swap the
//! reqwest implementation for a scripted one.

use crate::{ClientError, Config, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, multipart, Client};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP method
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// One field of a multipart form
#[derive(Clone, Debug)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime: String,
        data: Bytes,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Request body
#[derive(Clone, Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Form(Vec<FormPart>),
    Bytes(Bytes),
}

/// A transport-agnostic HTTP request
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Full URL, sent verbatim
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Overrides the transport default when set
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Body::Form(parts);
        self
    }

    pub fn bytes(mut self, data: Bytes) -> Self {
        self.body = Body::Bytes(data);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a text form field, if the body is a form carrying it
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            Body::Form(parts) => parts.iter().find_map(|part| match part {
                FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Check if the form carries a field (text or file) with this name
    pub fn has_form_field(&self, name: &str) -> bool {
        matches!(&self.body, Body::Form(parts) if parts.iter().any(|p| p.name() == name))
    }
}

/// A buffered HTTP response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Body as text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Capability to issue HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the whole response.
    ///
    /// Non-success statuses are returned as responses, not errors; only
    /// connection failures and timeouts are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport with the config's default timeout and user agent
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| ClientError::Config(format!("Invalid user agent: {}", config.user_agent)))?,
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http })
    }

    /// Wrap an existing client
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut req = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
            Method::Put => self.http.put(&request.url),
        };

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req = match request.body {
            Body::Empty => req,
            Body::Bytes(data) => req.body(data),
            Body::Form(parts) => {
                let mut form = multipart::Form::new();
                for part in parts {
                    form = match part {
                        FormPart::Text { name, value } => form.text(name, value),
                        FormPart::File {
                            name,
                            filename,
                            mime,
                            data,
                        } => {
                            let file = multipart::Part::bytes(data.to_vec())
                                .file_name(filename)
                                .mime_str(&mime)?;
                            form.part(name, file)
                        }
                    };
                }
                req.multipart(form)
            }
        };

        debug!("Sending {} request to {}", request.method.as_str(), request.url);
        let response = req.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
