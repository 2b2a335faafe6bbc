//! YouTube Videos API types used for publishing.

use crate::templates::{PrivacyStatus, PublishMetadata};
use serde::{Deserialize, Serialize};

/// Request body for the `videos.insert` API call.
///
/// Only the `snippet` and `status` parts are sent; the media itself travels separately.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/insert>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInsertRequest {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

impl VideoInsertRequest {
    pub fn from_metadata(metadata: &PublishMetadata<'_>) -> Self {
        Self {
            snippet: VideoSnippet {
                title: metadata.title.to_string(),
                description: metadata.description.to_string(),
                tags: metadata.tags.to_vec(),
                category_id: metadata.category_id.to_string(),
            },
            status: VideoStatus {
                privacy_status: metadata.privacy_status,
                self_declared_made_for_kids: Some(false),
                upload_status: None,
            },
        }
    }
}

/// Basic details about a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Keyword tags, in the order they should be shown.
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: String,
}

/// Upload, processing and privacy status of a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: PrivacyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_declared_made_for_kids: Option<bool>,
    /// Set by YouTube in responses, e.g. `uploaded` or `processed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_status: Option<String>,
}

/// A `video` resource as returned after an upload.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub status: Option<VideoStatus>,
}
