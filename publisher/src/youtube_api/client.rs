//! Core YouTube API client functionality and access-token management.

use crate::artifacts::Artifact;
use crate::config::Endpoints;
use crate::credentials::Token;
use crate::oauth::OAuthManager;
use crate::youtube_api::{
    channels::{Channel, ChannelListResponse},
    comments::{CommentThread, CommentThreadInsertRequest},
    types::ApiErrorResponse,
    videos::{Video, VideoInsertRequest},
};
use eyre::Context;
use http::Method;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Access tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: SignedDuration = SignedDuration::from_secs(300);

/// A persisted token together with its expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: Token,
    /// When the access token should be treated as expired (with safety margin).
    ///
    /// `None` means the expiry is unknown and the token is used as-is.
    expires_at: Option<Timestamp>,
}

impl TimeBoundAccessToken {
    pub fn new(token: Token) -> Self {
        Self {
            expires_at: token
                .expires_at()
                .and_then(|at| at.checked_sub(EXPIRY_MARGIN).ok()),
            token,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - Refresh failed (invalid grant, no refresh token, etc.)
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        let Some(refresh_token) = self.token.refresh_token.clone() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(false);
        };
        let issued_at = Timestamp::now();
        match oauth_manager
            .refresh_token(&refresh_token)
            .await
            .context("refresh OAuth token")?
        {
            Some(response) => {
                let mut new_token = Token::from_response(&response, issued_at);
                if new_token.refresh_token.is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    new_token.refresh_token = Some(refresh_token);
                }
                new_token.extra = std::mem::take(&mut self.token.extra);
                *self = Self::new(new_token);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Client for the YouTube Data API v3, authorized by an OAuth token.
///
/// Expired access tokens are refreshed lazily, right before the next API call.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl YouTubeClient {
    pub fn new(
        token: TimeBoundAccessToken,
        oauth_manager: Arc<OAuthManager>,
        endpoints: Arc<Endpoints>,
    ) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager,
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// Returns a clone of the current token.
    pub async fn token(&self) -> Token {
        self.token.lock().await.token.clone()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.is_expired(Timestamp::now()) {
            tracing::debug!("access token expired, attempting refresh");
            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
            } else {
                tracing::error!("access token refresh failed, client is unusable");
                return Err(eyre::eyre!("Unable to refresh expired access token"));
            }
        }

        Ok(token.token.access_token.clone())
    }

    /// Starts a request carrying a fresh bearer token.
    async fn authorized(&self, method: Method, url: &str) -> eyre::Result<reqwest::RequestBuilder> {
        let access_token = self.fresh_access_token().await?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {access_token}")))
    }

    /// Makes an authenticated HTTP request to the YouTube API with common error handling.
    ///
    /// Query parameters and an optional JSON body are attached; any non-success status is
    /// turned into an error carrying the API's own error message when it has one.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let mut request = self.authorized(method.clone(), url).await?.query(query_params);
        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;
        ensure_success(&method, url, response).await
    }

    /// Uploads `artifact` as a new video described by `resource`.
    ///
    /// Uses the resumable upload protocol: a metadata request opens an upload session, then the
    /// file is streamed into that session in a single request. The session is not resumed if
    /// the transfer fails.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.upload`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/insert>
    /// <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>
    #[instrument(skip_all, fields(path = %artifact.path.display(), size = artifact.size_bytes))]
    pub async fn insert_video(
        &self,
        resource: &VideoInsertRequest,
        artifact: &Artifact,
    ) -> eyre::Result<Video> {
        let url = format!("{}/videos", self.endpoints.upload_base);
        let content_type = artifact.content_type();
        let size = artifact.size_bytes.to_string();

        let response = self
            .authorized(Method::POST, &url)
            .await?
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Length", &size)
            .header("X-Upload-Content-Type", content_type)
            .json(resource)
            .send()
            .await
            .context("open resumable upload session")?;
        let response = ensure_success(&Method::POST, &url, response).await?;
        let session = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| eyre::eyre!("upload session response has no Location header"))?
            .to_str()
            .context("upload session URL is not valid UTF-8")?
            .to_string();
        tracing::debug!(%session, "opened upload session");

        let file = tokio::fs::File::open(&artifact.path)
            .await
            .with_context(|| format!("open {}", artifact.path.display()))?;
        let response = self
            .authorized(Method::PUT, &session)
            .await?
            .header(CONTENT_LENGTH, &size)
            .header(CONTENT_TYPE, content_type)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .context("send video bytes")?;
        let response = ensure_success(&Method::PUT, &session, response).await?;

        let video: Video = response
            .json()
            .await
            .context("parse YouTube videos.insert response as JSON")?;
        tracing::debug!(video_id = video.id, "upload accepted");
        Ok(video)
    }

    /// Gets the channel owned by the authenticated user, with statistics.
    ///
    /// Returns `None` if the account has no channel.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self))]
    pub async fn get_my_channel(&self) -> eyre::Result<Option<Channel>> {
        let url = format!("{}/channels", self.endpoints.api_base);
        let query_params = [
            ("part", "snippet,statistics"),
            ("mine", "true"),
            ("maxResults", "1"),
        ];

        let response = self
            .make_authenticated_request(Method::GET, &url, &query_params, None::<&()>)
            .await?;

        let channels: ChannelListResponse = response
            .json()
            .await
            .context("parse YouTube channels API response as JSON")?;

        tracing::debug!(
            total_results = channels.page_info.as_ref().map(|p| p.total_results),
            returned_items = channels.items.len(),
            "fetched channels"
        );

        Ok(channels.items.into_iter().next())
    }

    /// Posts a top-level comment on a video.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.force-ssl`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/commentThreads/insert>
    #[instrument(skip(self, text))]
    pub async fn insert_comment(&self, video_id: &str, text: &str) -> eyre::Result<CommentThread> {
        let url = format!("{}/commentThreads", self.endpoints.api_base);
        let body = CommentThreadInsertRequest::new(video_id, text);

        let response = self
            .make_authenticated_request(Method::POST, &url, &[("part", "snippet")], Some(&body))
            .await?;

        response
            .json()
            .await
            .context("parse YouTube commentThreads API response as JSON")
    }
}

async fn ensure_success(
    method: &Method,
    url: &str,
    response: reqwest::Response,
) -> eyre::Result<reqwest::Response> {
    let status_code = response.status();
    if status_code.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let detail = ApiErrorResponse::detail(&error_text).unwrap_or(error_text);
    Err(eyre::eyre!(
        "YouTube API {} request to {} failed with status {}: {}",
        method,
        url,
        status_code,
        detail
    ))
}
