use clap::Parser;
use lofi_publisher::config::{Endpoints, PipelineArgs, PipelineConfig};
use lofi_publisher::error::PipelineError;
use lofi_publisher::session::ConsolePrompt;
use lofi_publisher::templates::TemplateRegistry;
use lofi_publisher::{PublishOutcome, run_upload, template_listing};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Upload the most recently rendered video to YouTube.
#[derive(Debug, Parser)]
#[command(name = "lofi-upload", version)]
struct Cli {
    /// Template supplying title, description and tags. Unknown keys fall back to the default.
    template: Option<String>,

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

    let cli = Cli::parse();
    let config = PipelineConfig::from(cli.pipeline);

    println!("=== YouTube Video Uploader ===\n");
    match TemplateRegistry::load(config.template_catalog.as_deref()).await {
        Ok(templates) => println!("{}\n", template_listing(&templates, "lofi-upload")),
        Err(e) => return report(e),
    }

    match run_upload(
        &config,
        Endpoints::default(),
        cli.template.as_deref(),
        ConsolePrompt,
    )
    .await
    {
        Ok(PublishOutcome::Published { result, .. }) => {
            println!("\nUpload successful!");
            println!("Video ID: {}", result.remote_id);
            println!("URL: {}", result.url);
            ExitCode::SUCCESS
        }
        Ok(PublishOutcome::NothingToUpload { videos_dir }) => {
            println!("No video files found in {}", videos_dir.display());
            println!("Run `lofi-generate` to render a video first");
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

fn report(e: PipelineError) -> ExitCode {
    tracing::error!(stage = e.stage(), error = %e, "pipeline halted");
    eprintln!("{e}");
    if let Some(guidance) = e.guidance() {
        eprintln!("\n{guidance}");
    }
    ExitCode::from(e.exit_code())
}
