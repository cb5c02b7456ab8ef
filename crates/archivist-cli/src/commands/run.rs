//! Run command implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use archivist::{ArchivistClient, Runner, Story};

use crate::output;

const URL_VAR: &str = "ARCHIVIST_URL";
const TOKEN_VAR: &str = "ARCHIVIST_AUTHTOKEN";
const CLIENT_ID_VAR: &str = "ARCHIVIST_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "ARCHIVIST_CLIENT_SECRET";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Story file to replay
    pub story: PathBuf,

    /// Service base URL (or ARCHIVIST_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Bearer token (or ARCHIVIST_AUTHTOKEN)
    #[arg(long)]
    pub auth_token: Option<String>,

    /// File holding the bearer token
    #[arg(long, conflicts_with = "auth_token")]
    pub auth_token_file: Option<PathBuf>,

    /// App registration client id (or ARCHIVIST_CLIENT_ID)
    #[arg(long)]
    pub client_id: Option<String>,

    /// App registration client secret (or ARCHIVIST_CLIENT_SECRET)
    #[arg(long)]
    pub client_secret: Option<String>,

    /// File holding the client secret
    #[arg(long, conflicts_with = "client_secret")]
    pub client_secret_file: Option<PathBuf>,

    /// Skip TLS certificate verification (test instances only)
    #[arg(long)]
    pub insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let client = build_client(&args).await?;

    let text = tokio::fs::read_to_string(&args.story)
        .await
        .with_context(|| format!("Failed to read story file {}", args.story.display()))?;
    let story = Story::from_yaml(&text).context("Failed to parse story")?;

    eprintln!(
        "{}",
        format!("Running {} steps...", story.steps.len()).dimmed()
    );

    let mut runner = Runner::new(client);
    runner.run(&story).await.context("Story failed")?;

    output::success("Story complete");
    output::field("Steps", &story.steps.len().to_string());
    Ok(())
}

async fn build_client(args: &RunArgs) -> Result<ArchivistClient> {
    let url = args
        .url
        .clone()
        .or_else(|| std::env::var(URL_VAR).ok())
        .context("No service URL: pass --url or set ARCHIVIST_URL")?;

    let token = secret_value(
        args.auth_token.as_deref(),
        args.auth_token_file.as_deref(),
        TOKEN_VAR,
    )
    .await?;
    let client_id = args
        .client_id
        .clone()
        .or_else(|| std::env::var(CLIENT_ID_VAR).ok());
    let client_secret = secret_value(
        args.client_secret.as_deref(),
        args.client_secret_file.as_deref(),
        CLIENT_SECRET_VAR,
    )
    .await?;

    let mut builder = ArchivistClient::builder(&url)
        .with_verify_tls(!args.insecure)
        .with_request_timeout(Duration::from_secs(args.timeout));
    if let Some(token) = token {
        builder = builder.with_bearer_token(token);
    }
    if let (Some(id), Some(secret)) = (client_id, client_secret) {
        builder = builder.with_client_credentials(id, secret);
    }
    builder.build().context("Failed to configure the client")
}

/// Credential resolution order: flag value, file contents, environment.
async fn secret_value(
    flag: Option<&str>,
    file: Option<&Path>,
    var: &str,
) -> Result<Option<String>> {
    if let Some(value) = flag {
        return Ok(Some(value.to_owned()));
    }
    if let Some(path) = file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Some(contents.trim().to_owned()));
    }
    Ok(std::env::var(var).ok())
}
