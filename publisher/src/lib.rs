use crate::artifacts::{Artifact, ArtifactLocator};
use crate::config::{Endpoints, PipelineConfig};
use crate::credentials::CredentialStore;
use crate::engagement::{ChannelSummary, CommentOutcome, EngagementReporter};
use crate::error::{ExitInfo, PipelineError, RenderStage};
use crate::session::{AuthSession, AuthorizationCodeProvider};
use crate::synth::{Palette, Renderer, Synthesizer};
use crate::templates::TemplateRegistry;
use crate::uploader::{UploadRequest, UploadResult};
use std::fmt::Write;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

pub mod artifacts;
pub mod config;
pub mod credentials;
pub mod engagement;
pub mod error;
pub mod oauth;
pub mod session;
pub mod status;
pub mod synth;
pub mod templates;
pub mod uploader;
pub mod youtube_api;

/// Printed when the client configuration file is missing.
pub const CONFIGURATION_GUIDANCE: &str = "\
OAuth setup required. Follow these steps:

1. Create a Google Cloud project:
   https://console.cloud.google.com
2. Enable the YouTube Data API v3:
   https://console.cloud.google.com/apis/library/youtube.googleapis.com
3. Create OAuth credentials:
   https://console.cloud.google.com/apis/credentials
   (Create Credentials > OAuth client ID > Desktop app)
4. Download the JSON and save it as the client configuration file
   (`--client-secrets`, default client_secrets.json)
5. Run this command again";

/// How a publish run ended, short of an error.
#[derive(Debug)]
pub enum PublishOutcome {
    Published {
        result: UploadResult,
        comment: CommentOutcome,
        channel: Option<ChannelSummary>,
    },
    /// There was no video artifact to upload.
    NothingToUpload { videos_dir: PathBuf },
}

/// Publishes the latest rendered video with the metadata of `template_key`.
///
/// Stages run strictly in order: template resolution, authorization, artifact discovery, upload,
/// then best-effort engagement follow-ups. The first failing stage ends the run.
pub async fn run_upload<P: AuthorizationCodeProvider>(
    config: &PipelineConfig,
    endpoints: Endpoints,
    template_key: Option<&str>,
    provider: P,
) -> Result<PublishOutcome, PipelineError> {
    let templates = TemplateRegistry::load(config.template_catalog.as_deref()).await?;
    let template = templates.resolve(template_key);
    if let Some(key) = templates.unknown_key(template_key) {
        tracing::warn!(requested = key, using = %template.key, "unknown template, using default");
    }
    tracing::info!(template = %template.key, title = %template.title, "using template");

    let mut session = AuthSession::new(
        CredentialStore::from_config(config),
        Arc::new(endpoints),
        provider,
    );
    let client = session.authorize().await?;

    let videos_dir = config.videos_dir();
    let Some(artifact) = ArtifactLocator::latest(&videos_dir, "mp4")
        .await
        .map_err(PipelineError::upload)?
    else {
        tracing::warn!(dir = %videos_dir.display(), "no video files found");
        return Ok(PublishOutcome::NothingToUpload { videos_dir });
    };

    let request = UploadRequest {
        template: template.clone(),
        artifact,
    };
    let result = uploader::publish(&request, &client).await?;

    let engagement = EngagementReporter::new(config.comments_enabled);
    let comment = engagement
        .post_engagement_comment(&client, &result.remote_id)
        .await;
    let channel = engagement.report_channel_stats(&client).await;

    Ok(PublishOutcome::Published {
        result,
        comment,
        channel,
    })
}

/// What a generation run produced.
#[derive(Debug)]
pub struct GeneratedArtifacts {
    pub video: Artifact,
    /// `None` if the thumbnail render failed; that does not fail the run.
    pub thumbnail: Option<PathBuf>,
}

/// Renders one video of the configured length, plus a thumbnail.
pub async fn generate_daily_video<R: Renderer>(
    config: &PipelineConfig,
    renderer: R,
) -> Result<GeneratedArtifacts, PipelineError> {
    let duration = NonZeroU32::new(config.default_duration_seconds).ok_or_else(|| {
        PipelineError::Configuration("video duration must be at least one second".to_string())
    })?;
    config
        .ensure_dirs()
        .await
        .map_err(PipelineError::configuration)?;

    let synthesizer = Synthesizer::new(config, renderer);
    let palette = Palette::default();

    tracing::info!(
        duration_minutes = duration.get() / 60,
        "generating lofi video"
    );
    let spec = synthesizer.build_video_spec(duration, &palette);
    let path = synthesizer.render(&spec).await?;
    let video = Artifact::from_path(&path)
        .await
        .map_err(|e| PipelineError::Render {
            stage: RenderStage::Video,
            exit: ExitInfo::failed_to_run(&e),
        })?;
    tracing::info!(
        path = %video.path.display(),
        size_mb = format_args!("{:.2}", video.size_mb()),
        "video created"
    );

    let spec = synthesizer.build_thumbnail_spec(&palette, None);
    let thumbnail = match synthesizer.render(&spec).await {
        Ok(path) => {
            tracing::info!(path = %path.display(), "thumbnail created");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(error = %e, "thumbnail generation failed, continuing without one");
            None
        }
    };

    Ok(GeneratedArtifacts { video, thumbnail })
}

/// The template catalog and how to pick from it, for operators.
pub fn template_listing(templates: &TemplateRegistry, program: &str) -> String {
    let mut out = String::from("Available templates:\n");
    for (i, template) in templates.iter().enumerate() {
        let title: String = template.title.chars().take(40).collect();
        let short = if template.is_short() { " [short]" } else { "" };
        let _ = writeln!(
            out,
            "  {:>2}. {}: {title}...{short}",
            i + 1,
            template.key
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(
        out,
        "  {program}                 # default ({})",
        templates.default_template().key
    );
    let _ = write!(out, "  {program} <TEMPLATE>      # any key listed above");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::tests::FakeRenderer;

    #[test]
    fn listing_names_every_template() {
        let templates = TemplateRegistry::builtin();
        let listing = template_listing(&templates, "lofi-upload");
        for key in templates.keys() {
            assert!(listing.contains(&format!(". {key}: ")), "{key} missing");
        }
        assert!(listing.contains("default (christian_lofi)"), "{listing}");
        assert!(listing.contains(" 1. christian_lofi: "), "{listing}");
        let shorts = listing.lines().find(|l| l.contains(". shorts: ")).unwrap();
        assert!(shorts.ends_with("[short]"), "{shorts}");
        let default = listing.lines().find(|l| l.contains(". christian_lofi: ")).unwrap();
        assert!(!default.contains("[short]"), "{default}");
    }

    #[tokio::test]
    async fn generates_video_and_thumbnail() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_output_dir(root.path());
        let renderer = FakeRenderer::exiting_with(0);
        let calls = Arc::clone(&renderer.calls);

        let generated = generate_daily_video(&config, renderer).await.unwrap();
        assert!(generated.video.name().starts_with("lofi-nature-"));
        assert!(generated.video.name().ends_with(".mp4"));
        assert!(generated.thumbnail.unwrap().exists());
        assert!(config.music_dir().is_dir());
        assert!(config.temp_dir().join("render-video.sh").exists());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_duration_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::with_output_dir(root.path());
        config.default_duration_seconds = 0;
        let err = generate_daily_video(&config, FakeRenderer::exiting_with(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)), "{err:?}");
    }
}
