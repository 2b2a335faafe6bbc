use clap::Parser;
use lofi_publisher::config::{PipelineArgs, PipelineConfig};
use lofi_publisher::generate_daily_video;
use lofi_publisher::synth::ProcessRenderer;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Render one lofi video and a matching thumbnail into the output directory.
#[derive(Debug, Parser)]
#[command(name = "lofi-generate", version)]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = PipelineConfig::from(Cli::parse().pipeline);

    match generate_daily_video(&config, ProcessRenderer).await {
        Ok(generated) => {
            println!("Video: {}", generated.video.path.display());
            println!("Size: {:.2} MB", generated.video.size_mb());
            if let Some(thumbnail) = generated.thumbnail {
                println!("Thumbnail: {}", thumbnail.display());
            }
            println!("\nNext: run `lofi-upload` to publish it");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "generation failed");
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
