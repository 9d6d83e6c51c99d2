//! Shared data models for the meme marketplace.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Host used for images when a meme has none.
pub const PLACEHOLDER_IMAGE_BASE: &str = "https://picsum.photos/400/400";

// --- Identity ---

/// Opaque meme identifier.
///
/// Servers emit either JSON strings or integers; both normalise to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemeId(String);

impl MemeId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for MemeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl FromStr for MemeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl<'de> Deserialize<'de> for MemeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        };
        MemeId::new(id).map_err(D::Error::custom)
    }
}

// --- Memes ---

/// A ranked, biddable meme as the server represents it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meme {
    pub id: MemeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Display order is insertion order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "non_negative_count")]
    pub upvotes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_bid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_bidder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Meme {
    /// Minimal meme with no votes, bids or generated text.
    pub fn new(id: MemeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            image_url: None,
            tags: Vec::new(),
            upvotes: 0,
            highest_bid: None,
            highest_bidder: None,
            caption: None,
            vibe: None,
            owner_id: String::new(),
            created_at: None,
        }
    }

    /// Current highest bid, treating "no bid" as zero.
    pub fn current_bid(&self) -> u64 {
        self.highest_bid.unwrap_or(0)
    }

    pub fn has_bid(&self) -> bool {
        self.current_bid() > 0
    }

    /// Image to display, falling back to a stable per-meme placeholder.
    pub fn image_url_or_placeholder(&self) -> String {
        match self.image_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}?random={}", PLACEHOLDER_IMAGE_BASE, self.id),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Counts the server may drive below zero (a downvote on a fresh meme) are
/// read as zero. `null` is zero too.
pub(crate) fn non_negative_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Option::<RawCount>::deserialize(deserializer)? {
        Some(RawCount::Unsigned(n)) => n,
        Some(RawCount::Signed(n)) => n.max(0) as u64,
        None => 0,
    })
}

// --- Requests ---

/// Body of `POST /api/memes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMeme {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub tags: Vec<String>,
}

impl NewMeme {
    pub fn new(title: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: title.into(),
            image_url: None,
            tags,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Build a request from raw form input.
    ///
    /// Tags are comma separated; blanks are dropped. An empty image URL is
    /// replaced by a placeholder keyed on `now`.
    pub fn from_form(title: &str, image_url: &str, tags_csv: &str, now: DateTime<Utc>) -> Self {
        let image_url = match image_url.trim() {
            "" => placeholder_image_url(now),
            url => url.to_string(),
        };
        Self {
            title: title.trim().to_string(),
            image_url: Some(image_url),
            tags: split_tags(tags_csv),
        }
    }

    /// Checks performed before any request is sent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if !self.tags.iter().any(|t| !t.trim().is_empty()) {
            return Err(ValidationError::NoTags);
        }
        Ok(())
    }
}

/// Split a comma separated tag list, trimming and dropping empty entries.
pub fn split_tags(tags_csv: &str) -> Vec<String> {
    tags_csv
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn placeholder_image_url(now: DateTime<Utc>) -> String {
    format!("{}?random={}", PLACEHOLDER_IMAGE_BASE, now.timestamp_millis())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteType::Up => f.write_str("up"),
            VoteType::Down => f.write_str("down"),
        }
    }
}

impl FromStr for VoteType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(ValidationError::UnknownVoteType(other.to_string())),
        }
    }
}

/// Body of `POST /api/memes/{id}/vote`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub vote_type: VoteType,
}

/// Body of `POST /api/memes/{id}/bid`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidRequest {
    pub credits: u64,
}

impl BidRequest {
    pub fn new(credits: u64) -> Result<Self, ValidationError> {
        if credits == 0 {
            return Err(ValidationError::NonPositiveBid);
        }
        Ok(Self { credits })
    }
}

/// Parse user-entered bid credits. Only positive integers are accepted.
pub fn parse_bid_credits(input: &str) -> Result<u64, ValidationError> {
    let input = input.trim();
    let credits: i64 = input
        .parse()
        .map_err(|_| ValidationError::InvalidBid(input.to_string()))?;
    if credits <= 0 {
        return Err(ValidationError::NonPositiveBid);
    }
    Ok(credits as u64)
}
