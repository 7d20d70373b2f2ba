//! CLI configuration

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use filestack_client::{Config, FilestackClient, Policy, Security};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "filestack")]
#[command(about = "Upload, transform and zip files with the Filestack API")]
#[command(version)]
pub struct Cli {
    /// Filestack API key
    #[arg(long, env = "FILESTACK_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Application secret; when set, requests are signed with a generated policy
    #[arg(long, env = "FILESTACK_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Lifetime of the generated policy, in seconds
    #[arg(long, default_value = "3600", env = "FILESTACK_POLICY_EXPIRY")]
    pub policy_expiry: i64,

    /// Send every request to this base URL instead of the Filestack endpoints
    #[arg(long, env = "FILESTACK_BASE_URL")]
    pub base_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "FILESTACK_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a local file or store an external URL
    Upload(UploadArgs),
    /// Zip stored files into a new archive
    Zip(ZipArgs),
    /// Print the processing URL for a transformation chain
    Transform(TransformArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub file: Option<PathBuf>,

    /// External URL to store
    #[arg(long)]
    pub url: Option<String>,

    /// Send local files in a single request
    #[arg(long)]
    pub no_multipart: bool,

    /// Use intelligent ingestion
    #[arg(long)]
    pub intelligent: bool,

    /// Storage location
    #[arg(long, default_value = "s3")]
    pub storage: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Extra upload option (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct ZipArgs {
    /// Storage parameter (repeatable)
    #[arg(long = "store", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub storage: Vec<(String, String)>,

    /// Handles or URLs to zip
    #[arg(required = true)]
    pub files: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// External URL to transform
    pub url: String,

    /// Task as `name` or `name=key:value,key:value` (repeatable)
    #[arg(long = "task", value_name = "TASK")]
    pub tasks: Vec<String>,
}

impl Cli {
    /// Build the client described by the global flags
    pub fn client(&self) -> anyhow::Result<FilestackClient> {
        let mut config = Config::default();
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }

        let mut client = FilestackClient::with_config(&self.api_key, config)
            .context("failed to create Filestack client")?;

        if let Some(secret) = &self.app_secret {
            let policy = Policy::expires_in(self.policy_expiry);
            let security = Security::new(&policy, secret).context("failed to sign policy")?;
            client = client.with_security(security);
        }

        Ok(client)
    }
}

impl UploadArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Parse `key=value`
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Split a `name=key:value,key:value` task into its name and params
pub fn parse_task(raw: &str) -> anyhow::Result<(String, Vec<(String, String)>)> {
    let Some((name, params)) = raw.split_once('=') else {
        return Ok((raw.to_string(), Vec::new()));
    };

    let params = params
        .split(',')
        .map(|pair| {
            pair.split_once(':')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("task parameter `{}` must be key:value", pair))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok((name.to_string(), params))
}
