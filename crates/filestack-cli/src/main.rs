//! Filestack CLI - upload, transform and zip files

use clap::Parser;
use filestack_cli::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let cli = Cli::parse();

    // Setup logging (stderr, so stdout stays valid JSON)
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("filestack_cli={},filestack_client={}", log_level, log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(ref base_url) = cli.base_url {
        tracing::info!("Using custom endpoint: {}", base_url);
    }
    if cli.app_secret.is_none() {
        tracing::debug!("No app secret configured, requests are unsigned");
    }

    let output = run(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
