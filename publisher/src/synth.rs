//! Turns a duration and visual parameters into renderer invocations.
//!
//! The renderer itself is an opaque external process. This module only decides *what* to ask
//! it for ([`RenderSpec`]), how that request looks on a command line ([`RenderInvocation`]), and
//! whether the process reported success. Renderer output is never parsed.

use crate::config::PipelineConfig;
use crate::error::{ExitInfo, PipelineError, RenderStage};
use eyre::Context;
use std::future::Future;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Length of the source clip a thumbnail frame is taken from.
pub const THUMBNAIL_SECONDS: u32 = 5;
/// Fade length (in and out) used for thumbnails.
pub const THUMBNAIL_FADE_SECONDS: u32 = 2;

const FONT_FILE: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const FULL_HD: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };
    pub const HD: Canvas = Canvas {
        width: 1280,
        height: 720,
    };
}

/// Colors used for a render. Any color syntax the renderer accepts is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub background: String,
    pub text: String,
    pub accent: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: "#0a1628".to_string(),
            text: "white".to_string(),
            accent: "#40E0D0".to_string(),
        }
    }
}

/// Text drawn centered on a thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayText {
    pub title: String,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Overlay {
    text: OverlayText,
    text_color: String,
    accent_color: String,
}

/// A single request to the renderer.
///
/// Invariant: `fade_out_start_seconds + fade_out_seconds == duration_seconds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSpec {
    pub stage: RenderStage,
    pub duration_seconds: u32,
    pub canvas: Canvas,
    pub background_color: String,
    pub fade_in_seconds: u32,
    pub fade_out_start_seconds: u32,
    pub fade_out_seconds: u32,
    pub output_path: PathBuf,
    overlay: Option<Overlay>,
}

impl RenderSpec {
    pub fn overlay(&self) -> Option<&OverlayText> {
        self.overlay.as_ref().map(|o| &o.text)
    }
}

/// A command line for the external renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl RenderInvocation {
    /// Renders the invocation as a standalone shell script, for inspection and re-runs.
    pub fn to_script(&self) -> String {
        let mut script = String::from("#!/bin/bash\n");
        script.push_str(&shell_quote(&self.program));
        for arg in &self.args {
            script.push_str(" \\\n    ");
            script.push_str(&shell_quote(arg));
        }
        script.push('\n');
        script
    }
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,+".contains(&b))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Escapes a value for use as a drawtext option inside a filtergraph.
///
/// Two levels apply: the option value, then the filtergraph description.
fn escape_filter_value(s: &str) -> String {
    let mut value = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            value.push('\\');
        }
        value.push(c);
    }
    let mut graph = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

/// Capability to run the external renderer.
pub trait Renderer {
    /// Runs `invocation` to completion and reports how it exited.
    ///
    /// `Err` means the process could not be run at all.
    fn invoke(
        &self,
        invocation: &RenderInvocation,
    ) -> impl Future<Output = eyre::Result<ExitInfo>> + Send;
}

/// Runs the renderer as a child process, inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRenderer;

impl Renderer for ProcessRenderer {
    async fn invoke(&self, invocation: &RenderInvocation) -> eyre::Result<ExitInfo> {
        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("spawn renderer `{}`", invocation.program))?;
        Ok(ExitInfo::from(status))
    }
}

/// Builds render specs and drives the [`Renderer`].
#[derive(Debug, Clone)]
pub struct Synthesizer<R> {
    videos_dir: PathBuf,
    temp_dir: PathBuf,
    video_prefix: String,
    program: String,
    fade_in_seconds: u32,
    fade_out_seconds: u32,
    renderer: R,
}

impl<R: Renderer> Synthesizer<R> {
    pub fn new(config: &PipelineConfig, renderer: R) -> Self {
        Self {
            videos_dir: config.videos_dir(),
            temp_dir: config.temp_dir(),
            video_prefix: config.video_prefix.clone(),
            program: config.renderer_program.clone(),
            fade_in_seconds: config.fade_in_seconds,
            fade_out_seconds: config.fade_out_seconds,
            renderer,
        }
    }

    /// Spec for a video of exactly `duration` seconds.
    ///
    /// Fades never exceed the video itself, so for clips shorter than the configured fade the
    /// fade covers the whole clip.
    pub fn build_video_spec(&self, duration: NonZeroU32, palette: &Palette) -> RenderSpec {
        let duration_seconds = duration.get();
        let fade_out_seconds = self.fade_out_seconds.min(duration_seconds);
        let output_path = self.videos_dir.join(format!(
            "{}-{}.mp4",
            self.video_prefix,
            epoch_millis()
        ));
        RenderSpec {
            stage: RenderStage::Video,
            duration_seconds,
            canvas: Canvas::FULL_HD,
            background_color: palette.background.clone(),
            fade_in_seconds: self.fade_in_seconds.min(duration_seconds),
            fade_out_start_seconds: duration_seconds - fade_out_seconds,
            fade_out_seconds,
            output_path,
            overlay: None,
        }
    }

    /// Spec for a single-frame thumbnail. Independent of any video length.
    pub fn build_thumbnail_spec(
        &self,
        palette: &Palette,
        overlay_text: Option<OverlayText>,
    ) -> RenderSpec {
        let output_path = self
            .videos_dir
            .join(format!("thumbnail_{}.jpg", epoch_millis()));
        RenderSpec {
            stage: RenderStage::Thumbnail,
            duration_seconds: THUMBNAIL_SECONDS,
            canvas: Canvas::HD,
            background_color: palette.background.clone(),
            fade_in_seconds: THUMBNAIL_FADE_SECONDS,
            fade_out_start_seconds: THUMBNAIL_SECONDS - THUMBNAIL_FADE_SECONDS,
            fade_out_seconds: THUMBNAIL_FADE_SECONDS,
            output_path,
            overlay: overlay_text.map(|text| Overlay {
                text,
                text_color: palette.text.clone(),
                accent_color: palette.accent.clone(),
            }),
        }
    }

    /// The renderer command line for `spec`.
    pub fn invocation(&self, spec: &RenderSpec) -> RenderInvocation {
        let source = format!(
            "color=c={}:s={}x{}:d={}",
            spec.background_color, spec.canvas.width, spec.canvas.height, spec.duration_seconds
        );

        let mut filters = Vec::new();
        if let Some(overlay) = &spec.overlay {
            filters.push(drawtext(
                &overlay.text.title,
                &overlay.text_color,
                64,
                "(h-text_h)/2-30",
            ));
            if let Some(subtitle) = &overlay.text.subtitle {
                filters.push(drawtext(
                    subtitle,
                    &overlay.accent_color,
                    36,
                    "(h-text_h)/2+40",
                ));
            }
        }
        filters.push(format!("fade=t=in:st=0:d={}", spec.fade_in_seconds));
        filters.push(format!(
            "fade=t=out:st={}:d={}",
            spec.fade_out_start_seconds, spec.fade_out_seconds
        ));

        let mut args: Vec<String> = ["-y", "-f", "lavfi", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(source);
        args.push("-vf".to_string());
        args.push(filters.join(","));
        match spec.stage {
            RenderStage::Video => {
                let duration = spec.duration_seconds.to_string();
                args.extend(
                    [
                        "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-t", duration.as_str(),
                        "-pix_fmt", "yuv420p",
                    ]
                    .map(String::from),
                );
            }
            RenderStage::Thumbnail => {
                args.extend(["-frames:v", "1"].map(String::from));
            }
        }
        args.push(spec.output_path.display().to_string());

        RenderInvocation {
            program: self.program.clone(),
            args,
        }
    }

    /// Where the descriptor for a render of `stage` is written.
    pub fn descriptor_path(&self, stage: RenderStage) -> PathBuf {
        self.temp_dir.join(format!("render-{stage}.sh"))
    }

    /// Renders `spec`, blocking until the renderer exits.
    ///
    /// The invocation is first written to [`Self::descriptor_path`]. On failure any partial
    /// output is removed (best-effort) and a [`PipelineError::Render`] is returned.
    #[instrument(skip(self, spec), fields(stage = %spec.stage, output = %spec.output_path.display()))]
    pub async fn render(&self, spec: &RenderSpec) -> Result<PathBuf, PipelineError> {
        let invocation = self.invocation(spec);
        let descriptor = self.descriptor_path(spec.stage);
        let render_error = |exit| PipelineError::Render {
            stage: spec.stage,
            exit,
        };

        if let Err(e) = write_descriptor(&descriptor, &invocation).await {
            return Err(render_error(ExitInfo::failed_to_run(&e)));
        }
        tracing::info!(descriptor = %descriptor.display(), "invoking renderer");

        let exit = match self.renderer.invoke(&invocation).await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!(error = %e, "renderer could not be run");
                return Err(render_error(ExitInfo::failed_to_run(&e)));
            }
        };
        if !exit.success() {
            tracing::error!(%exit, "renderer failed");
            discard_partial_output(&spec.output_path).await;
            return Err(render_error(exit));
        }

        tracing::info!("render finished");
        Ok(spec.output_path.clone())
    }
}

fn drawtext(text: &str, color: &str, size: u32, y: &str) -> String {
    format!(
        "drawtext=fontfile={FONT_FILE}:expansion=none:text={}:fontcolor={}:fontsize={size}:\
         x=(w-text_w)/2:y={y}:shadowcolor=black:shadowx=2:shadowy=2",
        escape_filter_value(text),
        escape_filter_value(color),
    )
}

async fn write_descriptor(path: &Path, invocation: &RenderInvocation) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    tokio::fs::write(path, invocation.to_script())
        .await
        .with_context(|| format!("write render descriptor {}", path.display()))
}

async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial render output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove partial output"),
    }
}

fn epoch_millis() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Records invocations and answers with a fixed exit code, optionally creating the output.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeRenderer {
        pub(crate) exit_code: i32,
        pub(crate) create_output: bool,
        pub(crate) calls: Arc<Mutex<Vec<RenderInvocation>>>,
    }

    impl FakeRenderer {
        pub(crate) fn exiting_with(exit_code: i32) -> Self {
            Self {
                exit_code,
                create_output: true,
                calls: Arc::default(),
            }
        }
    }

    impl Renderer for FakeRenderer {
        async fn invoke(&self, invocation: &RenderInvocation) -> eyre::Result<ExitInfo> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.create_output {
                let output = invocation.args.last().expect("output path is last");
                tokio::fs::write(output, b"partial").await?;
            }
            Ok(ExitInfo::with_code(self.exit_code))
        }
    }

    fn synthesizer(root: &Path, renderer: FakeRenderer) -> Synthesizer<FakeRenderer> {
        Synthesizer::new(&PipelineConfig::with_output_dir(root), renderer)
    }

    #[test]
    fn video_fade_out_ends_at_duration() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        for d in [5, 6, 60, 3600, 7200, 86_400] {
            let spec = synth.build_video_spec(NonZeroU32::new(d).unwrap(), &Palette::default());
            assert_eq!(spec.duration_seconds, d);
            assert_eq!(spec.fade_out_start_seconds, d - 5);
            assert_eq!(spec.fade_out_seconds, 5);
            assert!(spec.fade_out_start_seconds + spec.fade_out_seconds <= d);
        }
    }

    #[test]
    fn very_short_video_fades_whole_clip() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        let spec = synth.build_video_spec(NonZeroU32::new(3).unwrap(), &Palette::default());
        assert_eq!(spec.fade_out_start_seconds, 0);
        assert_eq!(spec.fade_out_seconds, 3);
        assert_eq!(spec.fade_in_seconds, 3);
    }

    #[test]
    fn video_spec_names_output_after_prefix() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        let spec = synth.build_video_spec(NonZeroU32::new(3600).unwrap(), &Palette::default());
        assert_eq!(spec.output_path.parent(), Some(Path::new("out/videos")));
        let name = spec.output_path.file_name().unwrap().to_str().unwrap();
        let millis = name
            .strip_prefix("lofi-nature-")
            .and_then(|n| n.strip_suffix(".mp4"))
            .unwrap();
        assert!(millis.parse::<i64>().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn video_invocation_matches_renderer_contract() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        let mut spec = synth.build_video_spec(NonZeroU32::new(3600).unwrap(), &Palette::default());
        spec.output_path = PathBuf::from("out/videos/v.mp4");
        let invocation = synth.invocation(&spec);
        assert_eq!(invocation.program, "ffmpeg");
        assert_eq!(
            invocation.args,
            [
                "-y",
                "-f",
                "lavfi",
                "-i",
                "color=c=#0a1628:s=1920x1080:d=3600",
                "-vf",
                "fade=t=in:st=0:d=5,fade=t=out:st=3595:d=5",
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "23",
                "-t",
                "3600",
                "-pix_fmt",
                "yuv420p",
                "out/videos/v.mp4",
            ]
        );
    }

    #[test]
    fn thumbnail_spec_is_fixed_length() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        let spec = synth.build_thumbnail_spec(&Palette::default(), None);
        assert_eq!(spec.duration_seconds, 5);
        assert_eq!(spec.fade_in_seconds, 2);
        assert_eq!(spec.fade_out_start_seconds, 3);
        assert_eq!(spec.fade_out_seconds, 2);
        assert_eq!(spec.canvas, Canvas::HD);
        let name = spec.output_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("thumbnail_") && name.ends_with(".jpg"), "{name}");

        let invocation = synth.invocation(&spec);
        assert_eq!(
            invocation.args[4..7],
            [
                "color=c=#0a1628:s=1280x720:d=5",
                "-vf",
                "fade=t=in:st=0:d=2,fade=t=out:st=3:d=2",
            ]
        );
        assert_eq!(invocation.args[7..9], ["-frames:v", "1"]);
    }

    #[test]
    fn thumbnail_overlay_is_escaped() {
        let synth = synthesizer(Path::new("out"), FakeRenderer::exiting_with(0));
        let spec = synth.build_thumbnail_spec(
            &Palette::default(),
            Some(OverlayText {
                title: "CHRISTIAN LOFI".to_string(),
                subtitle: Some("Relax: Worship, Peace".to_string()),
            }),
        );
        assert_eq!(spec.overlay().unwrap().title, "CHRISTIAN LOFI");
        let filters = &synth.invocation(&spec).args[6];
        assert!(filters.starts_with("drawtext=fontfile="), "{filters}");
        assert!(filters.contains("text=CHRISTIAN LOFI:fontcolor=white:fontsize=64"));
        assert!(filters.contains(r"text=Relax\\: Worship\, Peace"), "{filters}");
        assert!(filters.contains("fontcolor=#40E0D0:fontsize=36"));
        assert!(filters.ends_with("fade=t=in:st=0:d=2,fade=t=out:st=3:d=2"));
    }

    #[test]
    fn script_quotes_arguments() {
        let invocation = RenderInvocation {
            program: "ffmpeg".to_string(),
            args: vec!["-i".to_string(), "it's here".to_string(), "a b".to_string()],
        };
        assert_eq!(
            invocation.to_script(),
            "#!/bin/bash\nffmpeg \\\n    -i \\\n    'it'\\''s here' \\\n    'a b'\n"
        );
    }

    #[tokio::test]
    async fn successful_render_writes_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_output_dir(root.path());
        config.ensure_dirs().await.unwrap();
        let renderer = FakeRenderer::exiting_with(0);
        let synth = Synthesizer::new(&config, renderer.clone());

        let spec = synth.build_video_spec(NonZeroU32::new(60).unwrap(), &Palette::default());
        let output = synth.render(&spec).await.unwrap();
        assert_eq!(output, spec.output_path);
        assert!(output.exists());

        let script = tokio::fs::read_to_string(synth.descriptor_path(RenderStage::Video))
            .await
            .unwrap();
        assert!(script.starts_with("#!/bin/bash\nffmpeg"));
        assert!(script.contains("color=c=#0a1628:s=1920x1080:d=60"));
        assert_eq!(renderer.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_render_is_render_error_and_leaves_no_output() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_output_dir(root.path());
        config.ensure_dirs().await.unwrap();
        let synth = Synthesizer::new(&config, FakeRenderer::exiting_with(1));

        let spec = synth.build_video_spec(NonZeroU32::new(60).unwrap(), &Palette::default());
        let err = synth.render(&spec).await.unwrap_err();
        match err {
            PipelineError::Render { stage, exit } => {
                assert_eq!(stage, RenderStage::Video);
                assert_eq!(exit, ExitInfo::with_code(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!spec.output_path.exists());
    }

    #[tokio::test]
    async fn missing_renderer_is_render_error() {
        let root = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::with_output_dir(root.path());
        config.renderer_program = root
            .path()
            .join("definitely-not-a-renderer")
            .display()
            .to_string();
        config.ensure_dirs().await.unwrap();
        let synth = Synthesizer::new(&config, ProcessRenderer);

        let spec = synth.build_thumbnail_spec(&Palette::default(), None);
        let err = synth.render(&spec).await.unwrap_err();
        assert!(
            matches!(
                err,
                PipelineError::Render {
                    stage: RenderStage::Thumbnail,
                    exit: ExitInfo { code: None, .. }
                }
            ),
            "{err:?}"
        );
    }
}
