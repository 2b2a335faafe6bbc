//! YouTube CommentThreads API types.

use serde::{Deserialize, Serialize};

/// Request body for `commentThreads.insert`, which posts a new top-level comment.
///
/// See: <https://developers.google.com/youtube/v3/docs/commentThreads/insert>
#[derive(Debug, Serialize)]
pub struct CommentThreadInsertRequest {
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub video_id: String,
    pub top_level_comment: TopLevelComment,
}

#[derive(Debug, Serialize)]
pub struct TopLevelComment {
    pub snippet: CommentSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub text_original: String,
}

impl CommentThreadInsertRequest {
    pub fn new(video_id: &str, text: &str) -> Self {
        Self {
            snippet: CommentThreadSnippet {
                video_id: video_id.to_string(),
                top_level_comment: TopLevelComment {
                    snippet: CommentSnippet {
                        text_original: text.to_string(),
                    },
                },
            },
        }
    }
}

/// A `commentThread` resource, as returned after insertion.
#[derive(Debug, Deserialize)]
pub struct CommentThread {
    pub id: String,
}
