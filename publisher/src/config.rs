//! Explicit configuration handed to every pipeline component.
//!
//! Nothing in the pipeline reads global state: output roots, timings, credential locations and
//! remote endpoints all live in a [`PipelineConfig`] (and [`Endpoints`]) built once by the binary.

use eyre::Context;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Options shared by every binary, flattened into each binary's own argument parser.
#[derive(Debug, Clone, clap::Args)]
pub struct PipelineArgs {
    /// Base output directory; `videos/`, `music/` and `temp/` live beneath it.
    #[arg(long, env = "LOFI_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Length of rendered videos, in seconds.
    #[arg(long, env = "LOFI_DURATION_SECONDS", default_value_t = 3600)]
    pub duration_seconds: u32,

    /// Fade-in length of rendered videos, in seconds.
    #[arg(long, env = "LOFI_FADE_IN_SECONDS", default_value_t = 5)]
    pub fade_in_seconds: u32,

    /// Fade-out length of rendered videos, in seconds.
    #[arg(long, env = "LOFI_FADE_OUT_SECONDS", default_value_t = 5)]
    pub fade_out_seconds: u32,

    /// File name prefix for rendered videos.
    #[arg(long, env = "LOFI_VIDEO_PREFIX", default_value = "lofi-nature")]
    pub video_prefix: String,

    /// Renderer executable.
    #[arg(long, env = "LOFI_RENDERER", default_value = "ffmpeg")]
    pub renderer: String,

    /// OAuth client configuration file, as downloaded from the Google Cloud console.
    #[arg(long, env = "LOFI_CLIENT_SECRETS", default_value = "client_secrets.json")]
    pub client_secrets: PathBuf,

    /// Where the OAuth token is persisted after the first authorization.
    #[arg(long, env = "LOFI_TOKEN_PATH", default_value = "token.json")]
    pub token_path: PathBuf,

    /// Alternative template catalog (JSON). The built-in catalog is used when absent.
    #[arg(long, env = "LOFI_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Actually post the engagement comment after a successful upload.
    #[arg(long, env = "LOFI_COMMENTS")]
    pub comments: bool,

    /// Listen address of the status service.
    #[arg(long, env = "LOFI_STATUS_LISTEN", default_value = "0.0.0.0:3102")]
    pub status_listen: SocketAddr,
}

/// Configuration of the content pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub default_duration_seconds: u32,
    pub fade_in_seconds: u32,
    pub fade_out_seconds: u32,
    pub video_prefix: String,
    pub renderer_program: String,
    pub client_secrets_path: PathBuf,
    pub token_path: PathBuf,
    pub template_catalog: Option<PathBuf>,
    pub comments_enabled: bool,
    pub status_listen: SocketAddr,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            default_duration_seconds: 3600,
            fade_in_seconds: 5,
            fade_out_seconds: 5,
            video_prefix: "lofi-nature".to_string(),
            renderer_program: "ffmpeg".to_string(),
            client_secrets_path: PathBuf::from("client_secrets.json"),
            token_path: PathBuf::from("token.json"),
            template_catalog: None,
            comments_enabled: false,
            status_listen: SocketAddr::from(([0, 0, 0, 0], 3102)),
        }
    }
}

impl From<PipelineArgs> for PipelineConfig {
    fn from(args: PipelineArgs) -> Self {
        Self {
            output_dir: args.output_dir,
            default_duration_seconds: args.duration_seconds,
            fade_in_seconds: args.fade_in_seconds,
            fade_out_seconds: args.fade_out_seconds,
            video_prefix: args.video_prefix,
            renderer_program: args.renderer,
            client_secrets_path: args.client_secrets,
            token_path: args.token_path,
            template_catalog: args.templates,
            comments_enabled: args.comments,
            status_listen: args.status_listen,
        }
    }
}

impl PipelineConfig {
    /// A configuration rooted at `output_dir`, with every other value at its default.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output_dir.join("videos")
    }

    pub fn music_dir(&self) -> PathBuf {
        self.output_dir.join("music")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.output_dir.join("temp")
    }

    /// Creates the output layout if it does not exist yet.
    pub async fn ensure_dirs(&self) -> eyre::Result<()> {
        for dir in [self.videos_dir(), self.music_dir(), self.temp_dir()] {
            create_dir(&dir).await?;
        }
        Ok(())
    }
}

async fn create_dir(dir: &Path) -> eyre::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create directory {}", dir.display()))
}

/// Google OAuth2 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google OAuth2 token endpoint, used for both code exchange and refresh.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Remote endpoints the pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_url: String,
    pub token_url: String,
    /// Base of the Data API, e.g. `https://www.googleapis.com/youtube/v3`.
    pub api_base: String,
    /// Base of the media upload API, e.g. `https://www.googleapis.com/upload/youtube/v3`.
    pub upload_base: String,
    /// Public host of the video platform, used to build watch URLs.
    pub watch_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            watch_host: "www.youtube.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Points every API endpoint at a single base URL (typically a local mock server).
    ///
    /// The watch host is left untouched since it is never requested.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/o/oauth2/v2/auth"),
            token_url: format!("{base}/token"),
            api_base: format!("{base}/youtube/v3"),
            upload_base: format!("{base}/upload/youtube/v3"),
            ..Self::default()
        }
    }

    pub fn watch_url(&self, video_id: &str) -> String {
        format!("https://{}/watch?v={}", self.watch_host, video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        pipeline: PipelineArgs,
    }

    #[test]
    fn args_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["test"]).unwrap();
        let config = PipelineConfig::from(cli.pipeline);
        // Environment overrides would make this flaky, so only compare when none are set.
        if std::env::vars().all(|(k, _)| !k.starts_with("LOFI_")) {
            assert_eq!(config, PipelineConfig::default());
        }
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "test",
            "--output-dir",
            "/srv/out",
            "--duration-seconds",
            "120",
            "--comments",
        ])
        .unwrap();
        let config = PipelineConfig::from(cli.pipeline);
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.default_duration_seconds, 120);
        assert!(config.comments_enabled);
        assert_eq!(config.videos_dir(), PathBuf::from("/srv/out/videos"));
        assert_eq!(config.temp_dir(), PathBuf::from("/srv/out/temp"));
    }

    #[tokio::test]
    async fn ensure_dirs_creates_layout() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_output_dir(root.path().join("output"));
        config.ensure_dirs().await.unwrap();
        assert!(config.videos_dir().is_dir());
        assert!(config.music_dir().is_dir());
        assert!(config.temp_dir().is_dir());
        // idempotent
        config.ensure_dirs().await.unwrap();
    }

    #[test]
    fn watch_url_uses_public_host() {
        let endpoints = Endpoints::rooted_at("http://127.0.0.1:9999/");
        assert_eq!(endpoints.token_url, "http://127.0.0.1:9999/token");
        assert_eq!(
            endpoints.watch_url("abc123"),
            "https://www.youtube.com/watch?v=abc123"
        );
    }
}
