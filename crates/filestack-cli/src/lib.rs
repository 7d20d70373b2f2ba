//! # Filestack CLI
//!
//! Command-line front end for `filestack-client`:
//!
//! - **upload**: Local files (multipart or single request) and external URLs
//! - **zip**: Bundle stored files into a new archive
//! - **transform**: Print processing URLs for a task chain
//!
//! Every command prints its result as JSON on stdout.

pub mod commands;
pub mod config;

pub use config::{Cli, Command};

/// Run the parsed command and return its JSON output
pub async fn run(cli: &Cli) -> anyhow::Result<serde_json::Value> {
    let client = cli.client()?;
    match &cli.command {
        Command::Upload(args) => commands::upload(&client, args).await,
        Command::Zip(args) => commands::zip(&client, args).await,
        Command::Transform(args) => commands::transform(&client, args),
    }
}
