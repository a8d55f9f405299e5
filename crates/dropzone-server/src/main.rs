use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use dropzone_server::{AppState, DropzoneConfig, LogFormat, init_logging, router};

#[derive(Parser)]
#[command(
    name = "dropzone",
    about = "Start a container task for every object uploaded to a bucket prefix"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "dropzone.toml")]
    config: PathBuf,
    /// Address the HTTP surface binds to
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = DropzoneConfig::load(&cli.config)?;
    let state = AppState::from_config(&config)?;
    tracing::info!(
        rule = %config.rule_name(),
        bucket = %config.bucket_name,
        prefix = %config.key_prefix,
        "rule ready"
    );

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, "listening");
    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
