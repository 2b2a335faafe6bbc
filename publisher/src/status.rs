//! Companion HTTP service that reports on the output directories.
//!
//! It only reads what the pipeline leaves on disk, with one exception: it can render an ad-hoc
//! thumbnail on request. The pipeline itself never talks to this service. Files listed under
//! `/videos/...` and `/music/...` are served from the matching output directory.

use crate::artifacts::{Artifact, ArtifactLocator};
use crate::config::PipelineConfig;
use crate::synth::{OverlayText, Palette, Renderer, Synthesizer};
use bytes::Bytes;
use eyre::Context;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::{Method, Response, StatusCode, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{self, Frame};
use hyper::service::service_fn;
use jiff::Timestamp;
use serde::Serialize;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

/// Response body: either a small JSON document or a file streamed from disk.
pub type Body = BoxBody<Bytes, std::io::Error>;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav"];
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

const DEFAULT_THUMBNAIL_TITLE: &str = "CHRISTIAN LOFI";
const DEFAULT_THUMBNAIL_SUBTITLE: &str = "Relax • Worship • Peace";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct FileEntry {
    name: String,
    path: String,
    size: u64,
}

impl FileEntry {
    fn new(mount: &str, artifact: &Artifact) -> Self {
        let name = artifact.name();
        Self {
            path: format!("/{mount}/{name}"),
            name,
            size: artifact.size_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
struct FilesResponse {
    videos: Vec<FileEntry>,
    music: Vec<FileEntry>,
}

#[derive(Debug, Serialize)]
struct ThumbnailEntry {
    #[serde(flatten)]
    file: FileEntry,
    created: Timestamp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailsResponse {
    thumbnails: Vec<ThumbnailEntry>,
    total_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    video_count: usize,
    total_size: u64,
    latest_video: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeneratedThumbnail {
    success: bool,
    file: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// The status service over one output layout.
#[derive(Debug)]
pub struct StatusService<R> {
    videos_dir: PathBuf,
    music_dir: PathBuf,
    synthesizer: Synthesizer<R>,
    palette: Palette,
}

impl<R> StatusService<R>
where
    R: Renderer + Send + Sync + 'static,
{
    pub fn new(config: &PipelineConfig, renderer: R) -> Self {
        Self {
            videos_dir: config.videos_dir(),
            music_dir: config.music_dir(),
            synthesizer: Synthesizer::new(config, renderer),
            palette: Palette::default(),
        }
    }

    /// Accepts connections on `listener` forever.
    ///
    /// A failed accept (such as running out of file descriptors) is logged, and accepting
    /// resumes after a short pause.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> eyre::Result<()> {
        let addr = listener.local_addr().context("get local address")?;
        tracing::info!(%addr, "status service listening");
        loop {
            let (conn, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            let conn = hyper_util::rt::TokioIo::new(conn);
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<body::Incoming>| {
                    let this = Arc::clone(&this);
                    let (method, uri) = (req.method().clone(), req.uri().clone());
                    async move {
                        let response = this.handle(&method, &uri).await;
                        Ok::<_, Infallible>(response)
                    }
                });
                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(conn, service)
                    .await
                {
                    tracing::debug!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }

    /// Answers a single request.
    pub async fn handle(&self, method: &Method, uri: &Uri) -> Response<Body> {
        tracing::debug!(%method, %uri, "request");
        let path = uri.path();
        let result = match (method, path) {
            (&Method::GET, "/api/files") => self.files().await,
            (&Method::GET, "/api/thumbnails") => self.thumbnails().await,
            (&Method::GET, "/api/stats") => self.stats().await,
            (&Method::POST, "/api/generate-thumbnail") => {
                self.generate_thumbnail(uri.query()).await
            }
            (&Method::GET, _) if path.starts_with("/videos/") => {
                self.file(&self.videos_dir, &path["/videos/".len()..]).await
            }
            (&Method::GET, _) if path.starts_with("/music/") => {
                self.file(&self.music_dir, &path["/music/".len()..]).await
            }
            _ => return not_found(format!("no route for {method} {path}")),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(%method, %uri, error = %e, "request failed");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorResponse {
                    error: format!("{e:#}"),
                },
            )
        })
    }

    /// Streams `name` from `dir`.
    ///
    /// Only plain file names are served; anything that could step outside `dir` is not found.
    async fn file(&self, dir: &Path, name: &str) -> eyre::Result<Response<Body>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Ok(not_found(format!("no such file: {name}")));
        }
        let path = dir.join(name);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(not_found(format!("no such file: {name}")));
            }
            Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
        };
        let metadata = file
            .metadata()
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        if !metadata.is_file() {
            return Ok(not_found(format!("no such file: {name}")));
        }
        let artifact = Artifact::from_path(&path).await?;

        let frames = ReaderStream::new(file).map(|chunk| chunk.map(Frame::data));
        let mut response = Response::new(StreamBody::new(frames).boxed());
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(artifact.content_type()),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        Ok(response)
    }

    async fn files(&self) -> eyre::Result<Response<Body>> {
        let videos = ArtifactLocator::list(&self.videos_dir, VIDEO_EXTENSIONS).await?;
        let music = ArtifactLocator::list(&self.music_dir, MUSIC_EXTENSIONS).await?;
        Ok(json(
            StatusCode::OK,
            &FilesResponse {
                videos: videos.iter().map(|a| FileEntry::new("videos", a)).collect(),
                music: music.iter().map(|a| FileEntry::new("music", a)).collect(),
            },
        ))
    }

    async fn thumbnails(&self) -> eyre::Result<Response<Body>> {
        let mut thumbnails = ArtifactLocator::list(&self.videos_dir, THUMBNAIL_EXTENSIONS).await?;
        // newest first
        thumbnails.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total_size = thumbnails.iter().map(|a| a.size_bytes).sum();
        Ok(json(
            StatusCode::OK,
            &ThumbnailsResponse {
                thumbnails: thumbnails
                    .iter()
                    .map(|a| ThumbnailEntry {
                        file: FileEntry::new("videos", a),
                        created: a.created_at,
                    })
                    .collect(),
                total_size,
            },
        ))
    }

    async fn stats(&self) -> eyre::Result<Response<Body>> {
        let videos = ArtifactLocator::list(&self.videos_dir, VIDEO_EXTENSIONS).await?;
        Ok(json(
            StatusCode::OK,
            &StatsResponse {
                video_count: videos.len(),
                total_size: videos.iter().map(|a| a.size_bytes).sum(),
                latest_video: videos.first().map(Artifact::name),
            },
        ))
    }

    async fn generate_thumbnail(&self, query: Option<&str>) -> eyre::Result<Response<Body>> {
        let mut title = None;
        let mut subtitle = None;
        for (k, v) in form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            match &*k {
                "title" => title = Some(v.into_owned()),
                "subtitle" => subtitle = Some(v.into_owned()),
                _ => {}
            }
        }
        let overlay = match title {
            Some(title) => OverlayText { title, subtitle },
            None => OverlayText {
                title: DEFAULT_THUMBNAIL_TITLE.to_string(),
                subtitle: Some(
                    subtitle.unwrap_or_else(|| DEFAULT_THUMBNAIL_SUBTITLE.to_string()),
                ),
            },
        };

        tokio::fs::create_dir_all(&self.videos_dir)
            .await
            .with_context(|| format!("create {}", self.videos_dir.display()))?;
        let spec = self
            .synthesizer
            .build_thumbnail_spec(&self.palette, Some(overlay));
        let file = self.synthesizer.render(&spec).await?;
        Ok(json(
            StatusCode::OK,
            &GeneratedThumbnail {
                success: true,
                file: file.display().to_string(),
            },
        ))
    }
}

fn not_found(error: String) -> Response<Body> {
    json(StatusCode::NOT_FOUND, &ErrorResponse { error })
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"response serialization failed"}"#),
            )
        }
    };
    let mut response = Response::new(Full::new(body).map_err(|never| match never {}).boxed());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::tests::FakeRenderer;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn service(root: &Path, renderer: FakeRenderer) -> StatusService<FakeRenderer> {
        StatusService::new(&PipelineConfig::with_output_dir(root), renderer)
    }

    async fn call(
        service: &StatusService<FakeRenderer>,
        method: Method,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = service.handle(&method, &uri.parse().unwrap()).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn touch(dir: &Path, name: &str, bytes: usize) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), vec![0u8; bytes]).unwrap();
    }

    #[tokio::test]
    async fn lists_files() {
        let root = tempfile::tempdir().unwrap();
        let videos = root.path().join("videos");
        touch(&videos, "lofi-nature-100.mp4", 10);
        touch(&videos, "lofi-nature-200.mp4", 20);
        touch(&videos, "thumbnail_1.jpg", 1);
        let service = service(root.path(), FakeRenderer::exiting_with(0));

        let (status, body) = call(&service, Method::GET, "/api/files").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "videos": [
                    {"name": "lofi-nature-200.mp4", "path": "/videos/lofi-nature-200.mp4", "size": 20},
                    {"name": "lofi-nature-100.mp4", "path": "/videos/lofi-nature-100.mp4", "size": 10}
                ],
                "music": []
            })
        );
    }

    #[tokio::test]
    async fn listed_paths_are_served() {
        let root = tempfile::tempdir().unwrap();
        let videos = root.path().join("videos");
        let music = root.path().join("music");
        touch(&videos, "lofi-nature-200.mp4", 20);
        touch(&music, "rain.mp3", 5);
        let service = service(root.path(), FakeRenderer::exiting_with(0));

        let (_, listing) = call(&service, Method::GET, "/api/files").await;
        for (entry, size, content_type) in [
            (&listing["videos"][0], 20, "video/mp4"),
            (&listing["music"][0], 5, "audio/mpeg"),
        ] {
            let path = entry["path"].as_str().unwrap();
            let response = service
                .handle(&Method::GET, &path.parse().unwrap())
                .await;
            assert_eq!(response.status(), StatusCode::OK, "{path}");
            assert_eq!(response.headers()[CONTENT_TYPE], content_type);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(body.len(), size);
        }
    }

    #[tokio::test]
    async fn file_routes_stay_inside_their_directory() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "client_secrets.json", 1);
        touch(&root.path().join("videos"), "a.mp4", 1);
        std::fs::create_dir(root.path().join("videos").join("nested")).unwrap();
        let service = service(root.path(), FakeRenderer::exiting_with(0));

        for uri in [
            "/videos/../client_secrets.json",
            "/videos/..",
            "/videos/",
            "/videos/nested",
            "/music/a.mp4",
            "/videos/missing.mp4",
        ] {
            let (status, body) = call(&service, Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("videos"), "lofi-nature-1.mp4", 3);
        let service = Arc::new(service(root.path(), FakeRenderer::exiting_with(0)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(service.serve(listener));

        let client = reqwest::Client::new();
        for _ in 0..2 {
            let stats: serde_json::Value = client
                .get(format!("http://{addr}/api/stats"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(stats["latestVideo"], "lofi-nature-1.mp4");
        }
        let video = client
            .get(format!("http://{addr}/videos/lofi-nature-1.mp4"))
            .send()
            .await
            .unwrap();
        assert_eq!(video.headers()[CONTENT_LENGTH], "3");
        assert_eq!(video.bytes().await.unwrap().len(), 3);
        server.abort();
    }

    #[tokio::test]
    async fn thumbnails_and_stats() {
        let root = tempfile::tempdir().unwrap();
        let videos = root.path().join("videos");
        touch(&videos, "thumbnail_1.jpg", 3);
        touch(&videos, "cover.png", 4);
        touch(&videos, "lofi-nature-100.mp4", 10);
        touch(&videos, "lofi-nature-200.mp4", 20);
        let service = service(root.path(), FakeRenderer::exiting_with(0));

        let (status, body) = call(&service, Method::GET, "/api/thumbnails").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalSize"], 7);
        assert_eq!(body["thumbnails"].as_array().unwrap().len(), 2);
        assert!(body["thumbnails"][0]["created"].is_string());

        let (status, body) = call(&service, Method::GET, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "videoCount": 2,
                "totalSize": 30,
                "latestVideo": "lofi-nature-200.mp4"
            })
        );
    }

    #[tokio::test]
    async fn empty_layout_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), FakeRenderer::exiting_with(0));
        let (status, body) = call(&service, Method::GET, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"videoCount": 0, "totalSize": 0, "latestVideo": null})
        );
    }

    #[tokio::test]
    async fn generates_thumbnail_with_overlay() {
        let root = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::exiting_with(0);
        let calls = Arc::clone(&renderer.calls);
        let service = service(root.path(), renderer);

        let (status, body) = call(
            &service,
            Method::POST,
            "/api/generate-thumbnail?title=Sunday+Calm&subtitle=Rest",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let file = body["file"].as_str().unwrap();
        assert!(file.contains("thumbnail_"), "{file}");
        assert!(Path::new(file).exists());

        let calls = calls.lock().unwrap();
        let filters = &calls[0].args[calls[0].args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert!(filters.contains("text=Sunday Calm"), "{filters}");
        assert!(filters.contains("text=Rest"), "{filters}");
    }

    #[tokio::test]
    async fn failed_render_is_server_error() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), FakeRenderer::exiting_with(1));
        let (status, body) = call(&service, Method::POST, "/api/generate-thumbnail").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"].as_str().unwrap().contains("thumbnail"),
            "{body}"
        );
    }

    #[tokio::test]
    async fn unknown_route() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), FakeRenderer::exiting_with(0));
        let (status, body) = call(&service, Method::GET, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
