//! Best-effort follow-ups after a successful publish.
//!
//! Nothing in here can fail the pipeline: errors become [`EngagementError`]s that are logged and
//! then dropped.

use crate::error::EngagementError;
use crate::youtube_api::YouTubeClient;
use rand::seq::IndexedRandom;

/// Canned comments, one of which is picked per video.
pub const COMMENTS: [&str; 4] = [
    "🌙 Hope you're enjoying this relaxing lofi session! What are you studying or working on today?",
    "✨ Take a deep breath and enjoy the peaceful vibes. Good luck with your work!",
    "☕ Perfect for focus and relaxation. Let us know if you need more content like this!",
    "🌿 Thanks for watching! Like and subscribe for more calming study music!",
];

/// What happened to the engagement comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    /// Comments are disabled; `message` is what would have been posted.
    Skipped { message: &'static str },
    Posted { comment_id: String },
    Failed,
}

/// A summary of the authenticated channel.
///
/// Counts are `None` when the channel hides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub title: String,
    pub subscribers: Option<String>,
    pub views: Option<String>,
    pub videos: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementReporter {
    comments_enabled: bool,
}

impl EngagementReporter {
    pub fn new(comments_enabled: bool) -> Self {
        Self { comments_enabled }
    }

    /// Comments on a freshly published video with a message picked uniformly from [`COMMENTS`].
    ///
    /// Posting needs a broader scope than uploading, so it only happens when enabled and the
    /// token grants it.
    pub async fn post_engagement_comment(
        &self,
        client: &YouTubeClient,
        video_id: &str,
    ) -> CommentOutcome {
        let message = COMMENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(COMMENTS[0]);

        if !self.comments_enabled {
            tracing::info!(comment = message, "auto-comments disabled, not posting");
            return CommentOutcome::Skipped { message };
        }

        match client.insert_comment(video_id, message).await {
            Ok(thread) => {
                tracing::info!(comment_id = %thread.id, "posted engagement comment");
                CommentOutcome::Posted {
                    comment_id: thread.id,
                }
            }
            Err(e) => {
                let e = EngagementError::Comment(format!("{e:#}"));
                tracing::warn!(error = %e, "non-critical follow-up failed");
                CommentOutcome::Failed
            }
        }
    }

    /// Looks up the authenticated channel's statistics and logs them.
    ///
    /// Returns `None` if they are unavailable for any reason.
    pub async fn report_channel_stats(&self, client: &YouTubeClient) -> Option<ChannelSummary> {
        let channel = match client.get_my_channel().await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                let e = EngagementError::ChannelStats("account has no channel".to_string());
                tracing::warn!(error = %e, "non-critical follow-up failed");
                return None;
            }
            Err(e) => {
                let e = EngagementError::ChannelStats(format!("{e:#}"));
                tracing::warn!(error = %e, "non-critical follow-up failed");
                return None;
            }
        };

        let statistics = channel.statistics;
        let summary = ChannelSummary {
            title: channel.snippet.title,
            subscribers: statistics
                .as_ref()
                .filter(|s| !s.hidden_subscriber_count)
                .and_then(|s| s.subscriber_count.clone()),
            views: statistics.as_ref().and_then(|s| s.view_count.clone()),
            videos: statistics.as_ref().and_then(|s| s.video_count.clone()),
        };
        tracing::info!(
            name = %summary.title,
            subscribers = summary.subscribers.as_deref().unwrap_or("N/A"),
            views = summary.views.as_deref().unwrap_or("N/A"),
            videos = summary.videos.as_deref().unwrap_or("N/A"),
            "channel statistics"
        );
        Some(summary)
    }
}
