use clap::Parser;
use eyre::Context;
use lofi_publisher::config::{PipelineArgs, PipelineConfig};
use lofi_publisher::status::StatusService;
use lofi_publisher::synth::ProcessRenderer;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Serve JSON listings of rendered videos, music and thumbnails.
#[derive(Debug, Parser)]
#[command(name = "lofi-status", version)]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = PipelineConfig::from(Cli::parse().pipeline);
    let listener = tokio::net::TcpListener::bind(config.status_listen)
        .await
        .with_context(|| format!("bind to {}", config.status_listen))?;

    Arc::new(StatusService::new(&config, ProcessRenderer))
        .serve(listener)
        .await
}
