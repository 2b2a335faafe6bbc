use jiff::Timestamp;
use lofi_publisher::artifacts::ArtifactLocator;
use lofi_publisher::config::{Endpoints, PipelineConfig};
use lofi_publisher::engagement::CommentOutcome;
use lofi_publisher::error::{ExitInfo, PipelineError, RenderStage};
use lofi_publisher::session::StaticCode;
use lofi_publisher::synth::{RenderInvocation, Renderer};
use lofi_publisher::{PublishOutcome, generate_daily_video, run_upload};
use std::path::Path;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_SECRETS: &str = r#"{
    "installed": {
        "client_id": "abc.apps.googleusercontent.com",
        "client_secret": "shh",
        "redirect_uris": ["http://localhost"]
    }
}"#;

fn config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::with_output_dir(root.join("output"));
    config.client_secrets_path = root.join("client_secrets.json");
    config.token_path = root.join("token.json");
    config
}

#[tokio::test]
async fn publishes_latest_video_with_default_template() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());

    std::fs::write(&config.client_secrets_path, CLIENT_SECRETS).unwrap();
    let expiry = Timestamp::now().as_millisecond() + 3_600_000;
    std::fs::write(
        &config.token_path,
        format!(
            r#"{{"access_token":"ya29.persisted","refresh_token":"1//r","scope":"https://www.googleapis.com/auth/youtube.upload","token_type":"Bearer","expiry_date":{expiry}}}"#
        ),
    )
    .unwrap();
    config.ensure_dirs().await.unwrap();
    let size = 50 * 1024 * 1024;
    std::fs::write(
        config.videos_dir().join("lofi-nature-1699999999999.mp4"),
        b"older",
    )
    .unwrap();
    std::fs::write(
        config.videos_dir().join("lofi-nature-1700000000000.mp4"),
        vec![0u8; size],
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .and(query_param("uploadType", "resumable"))
        .and(header("authorization", "Bearer ya29.persisted"))
        .and(header("x-upload-content-length", size.to_string().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("location", format!("{}/upload/session/1", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "Xy12_abcDEF"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"id": "UC1", "snippet": {"title": "Lofi"}, "statistics": {"videoCount": "1"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = run_upload(
        &config,
        Endpoints::rooted_at(&server.uri()),
        None,
        StaticCode("unused".to_string()),
    )
    .await
    .unwrap();

    let PublishOutcome::Published {
        result,
        comment,
        channel,
    } = outcome
    else {
        panic!("expected a publish, got {outcome:?}");
    };
    assert_eq!(result.remote_id, "Xy12_abcDEF");
    assert_eq!(result.url, "https://www.youtube.com/watch?v=Xy12_abcDEF");
    assert!(matches!(comment, CommentOutcome::Skipped { .. }));
    assert_eq!(channel.unwrap().videos.as_deref(), Some("1"));

    let received = server.received_requests().await.unwrap();
    let metadata = received
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&metadata.body).unwrap();
    assert_eq!(body["snippet"]["categoryId"], "10");
    assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
    let media = received
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    assert_eq!(media.body.len(), size);
}

#[tokio::test]
async fn empty_output_is_nothing_to_upload() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    std::fs::write(&config.client_secrets_path, CLIENT_SECRETS).unwrap();
    std::fs::write(&config.token_path, r#"{"access_token":"a"}"#).unwrap();

    let outcome = run_upload(
        &config,
        Endpoints::rooted_at("http://127.0.0.1:9"),
        Some("worship"),
        StaticCode("unused".to_string()),
    )
    .await
    .unwrap();
    assert!(
        matches!(outcome, PublishOutcome::NothingToUpload { .. }),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn missing_client_configuration_halts() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());

    let err = run_upload(
        &config,
        Endpoints::rooted_at("http://127.0.0.1:9"),
        None,
        StaticCode("never asked".to_string()),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, PipelineError::MissingClientConfiguration { .. }),
        "{err:?}"
    );
    assert!(err.guidance().is_some());
    assert_eq!(err.exit_code(), 1);
    assert!(!config.token_path.exists());
}

/// Writes part of the output, then fails.
struct CrashingRenderer;

impl Renderer for CrashingRenderer {
    async fn invoke(&self, invocation: &RenderInvocation) -> eyre::Result<ExitInfo> {
        let output = invocation.args.last().expect("output path is last");
        tokio::fs::write(output, b"truncated").await?;
        Ok(ExitInfo::with_code(1))
    }
}

#[tokio::test]
async fn failed_render_leaves_nothing_to_upload() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());

    let err = generate_daily_video(&config, CrashingRenderer)
        .await
        .unwrap_err();
    let PipelineError::Render { stage, exit } = &err else {
        panic!("expected render error, got {err:?}");
    };
    assert_eq!(*stage, RenderStage::Video);
    assert_eq!(exit.code, Some(1));
    assert_eq!(err.exit_code(), 1);

    assert_eq!(
        ArtifactLocator::latest(&config.videos_dir(), "mp4")
            .await
            .unwrap(),
        None
    );
}
