//! Publishing a rendered artifact with template metadata.

use crate::artifacts::Artifact;
use crate::error::PipelineError;
use crate::templates::Template;
use crate::youtube_api::{VideoInsertRequest, YouTubeClient};
use eyre::Context;
use tracing::instrument;

/// What to publish.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub template: Template,
    pub artifact: Artifact,
}

/// Where it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub remote_id: String,
    pub url: String,
}

/// Uploads `request.artifact` with the metadata of `request.template`.
///
/// The whole file is sent as one logical upload. The artifact is left on disk whether or not
/// the upload succeeds.
#[instrument(skip_all, fields(template = %request.template.key, artifact = %request.artifact.path.display()))]
pub async fn publish(
    request: &UploadRequest,
    client: &YouTubeClient,
) -> Result<UploadResult, PipelineError> {
    let resource = VideoInsertRequest::from_metadata(&request.template.metadata());
    tracing::info!(
        title = %request.template.title,
        size_mb = format_args!("{:.2}", request.artifact.size_mb()),
        "uploading"
    );

    let video = client
        .insert_video(&resource, &request.artifact)
        .await
        .with_context(|| format!("upload {}", request.artifact.path.display()))
        .map_err(PipelineError::upload)?;
    if video.id.is_empty() {
        return Err(PipelineError::Upload {
            reason: "upload response carried no video id".to_string(),
        });
    }

    let url = client.endpoints().watch_url(&video.id);
    tracing::info!(video_id = %video.id, %url, "upload successful");
    Ok(UploadResult {
        remote_id: video.id,
        url,
    })
}
