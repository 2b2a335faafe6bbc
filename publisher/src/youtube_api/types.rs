//! Shared types for the YouTube API client.

use serde::{Deserialize, Serialize};

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Serialize, Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults")]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
}

/// The error envelope Google APIs return on failure.
///
/// See: <https://developers.google.com/youtube/v3/docs/errors>
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub(crate) code: Option<u16>,
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorItem {
    pub(crate) reason: Option<String>,
}

impl ApiErrorResponse {
    /// The most useful human-readable detail in an error body, if it has the expected shape.
    pub(crate) fn detail(body: &str) -> Option<String> {
        let parsed: ApiErrorResponse = serde_json::from_str(body).ok()?;
        let reason = parsed.error.errors.iter().find_map(|e| e.reason.as_deref());
        match (parsed.error.message, reason) {
            (Some(message), Some(reason)) => Some(format!("{message} ({reason})")),
            (Some(message), None) => Some(message),
            (None, Some(reason)) => Some(reason.to_string()),
            (None, None) => parsed.error.code.map(|c| format!("error code {c}")),
        }
    }
}
