//! Stored files and transformation chains

use crate::{Config, Security};
use std::fmt;

/// A stored file
#[derive(Clone, Debug)]
pub struct Filelink {
    handle: String,
    apikey: String,
    security: Option<Security>,
    cdn_url: String,
    process_url: String,
}

impl Filelink {
    /// Create a filelink for an existing handle
    pub fn new(
        handle: impl Into<String>,
        apikey: impl Into<String>,
        security: Option<Security>,
        config: &Config,
    ) -> Self {
        Self {
            handle: handle.into(),
            apikey: apikey.into(),
            security,
            cdn_url: config.cdn_url.clone(),
            process_url: config.process_url.clone(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn apikey(&self) -> &str {
        &self.apikey
    }

    pub fn security(&self) -> Option<&Security> {
        self.security.as_ref()
    }

    /// CDN URL, signed when security is configured
    pub fn url(&self) -> String {
        let base = format!("{}/{}", self.cdn_url.trim_end_matches('/'), self.handle);
        match &self.security {
            Some(security) => format!("{}?{}", base, security.query_string()),
            None => base,
        }
    }

    /// Start a transformation chain on this file
    pub fn transform(&self) -> Transform {
        Transform {
            source: TransformSource::Handle(self.handle.clone()),
            apikey: self.apikey.clone(),
            security: self.security.clone(),
            process_url: self.process_url.clone(),
            tasks: Vec::new(),
        }
    }
}

impl fmt::Display for Filelink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// What a transformation applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformSource {
    /// A stored file
    Handle(String),
    /// A file the processing API fetches itself
    External(String),
}

/// A chain of processing tasks, rendered into a processing URL
#[derive(Clone, Debug)]
pub struct Transform {
    source: TransformSource,
    apikey: String,
    security: Option<Security>,
    process_url: String,
    tasks: Vec<String>,
}

impl Transform {
    /// Transformation of an external URL
    pub fn external(
        url: impl Into<String>,
        apikey: impl Into<String>,
        security: Option<Security>,
        config: &Config,
    ) -> Self {
        Self {
            source: TransformSource::External(url.into()),
            apikey: apikey.into(),
            security,
            process_url: config.process_url.clone(),
            tasks: Vec::new(),
        }
    }

    pub fn source(&self) -> &TransformSource {
        &self.source
    }

    pub fn apikey(&self) -> &str {
        &self.apikey
    }

    pub fn security(&self) -> Option<&Security> {
        self.security.as_ref()
    }

    /// Append a task; `params` render as `name=k:v,k:v`
    pub fn task<K, V>(mut self, name: &str, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: Vec<String> = params
            .into_iter()
            .map(|(k, v)| format!("{}:{}", k.as_ref(), v.as_ref()))
            .collect();
        let task = if params.is_empty() {
            name.to_string()
        } else {
            format!("{}={}", name, params.join(","))
        };
        self.tasks.push(task);
        self
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Processing URL for the chain
    pub fn url(&self) -> String {
        let mut segments = vec![
            self.process_url.trim_end_matches('/').to_string(),
            self.apikey.clone(),
        ];
        if let Some(security) = &self.security {
            segments.push(security.path_segment());
        }
        segments.extend(self.tasks.iter().cloned());
        segments.push(match &self.source {
            TransformSource::Handle(handle) => handle.clone(),
            TransformSource::External(url) => url.clone(),
        });
        segments.join("/")
    }
}
