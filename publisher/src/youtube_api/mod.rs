//! YouTube Data API v3 client library.
//!
//! Only the calls the publishing pipeline needs are covered:
//!
//! - [`YouTubeClient::insert_video`] uploads a rendered artifact together with its
//!   [`videos::VideoInsertRequest`] metadata using the resumable upload protocol.
//! - [`YouTubeClient::get_my_channel`] reads the authenticated channel and its statistics.
//! - [`YouTubeClient::insert_comment`] posts a top-level comment on a video.
//!
//! The client holds a [`TimeBoundAccessToken`] and refreshes it on demand, so callers never deal
//! with token expiry themselves.

pub mod channels;
pub mod client;
pub mod comments;
pub mod types;
pub mod videos;

// Re-export main types for convenience
pub use client::{TimeBoundAccessToken, YouTubeClient};
pub use types::PageInfo;

pub use channels::{Channel, ChannelSnippet, ChannelStatistics};
pub use comments::{CommentThread, CommentThreadInsertRequest};
pub use videos::{Video, VideoInsertRequest, VideoSnippet, VideoStatus};
