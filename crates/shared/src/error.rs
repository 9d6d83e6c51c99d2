//! Shared error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RFC7807 Problem Details (application/problem+json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type", default)]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    #[serde(default)]
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Bare `{"error": "..."}` body returned by the marketplace server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Attempt to pull a user-facing message out of an error response body.
/// Prefers a problem `detail`, then its `title`, then a bare `error` field.
pub fn try_problem_detail(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ProblemDetails>(body) {
        if let Some(detail) = parsed.detail.filter(|d| !d.trim().is_empty()) {
            return Some(detail);
        }
        if !parsed.title.trim().is_empty() {
            return Some(parsed.title);
        }
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|e| !e.trim().is_empty())
}

fn describe_body(body: &str) -> String {
    try_problem_detail(body).unwrap_or_else(|| body.to_string())
}

/// Transport failure talking to the marketplace API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {}", describe_body(.body))]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Input rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("at least one tag is required")]
    NoTags,
    #[error("bid must be a positive number of credits")]
    NonPositiveBid,
    #[error("bid is not a number: {0:?}")]
    InvalidBid(String),
    #[error("vote type must be \"up\" or \"down\", got {0:?}")]
    UnknownVoteType(String),
    #[error("meme id is empty")]
    EmptyId,
}
