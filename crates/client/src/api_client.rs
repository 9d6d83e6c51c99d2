//! HTTP client for the marketplace REST API.

use std::time::Duration;

use async_trait::async_trait;
use memehustle_shared::{ApiError, BidRequest, Meme, MemeId, NewMeme, VoteRequest, VoteType};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Header carrying the per-request correlation id.
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";

/// The server operations the sync engine depends on.
///
/// [`ApiClient`] is the HTTP implementation; tests substitute in-memory ones.
#[async_trait]
pub trait MemeApi: Send + Sync {
    /// `GET /api/memes`: the full collection, server ordered.
    async fn list_memes(&self) -> Result<Vec<Meme>, ApiError>;

    /// `GET /api/leaderboard?top=N`: up to `top` memes, ranked by the server.
    async fn leaderboard(&self, top: usize) -> Result<Vec<Meme>, ApiError>;

    /// `POST /api/memes`. Returns the created meme when the server echoes it.
    async fn create_meme(&self, meme: &NewMeme) -> Result<Option<Meme>, ApiError>;

    /// `POST /api/memes/{id}/vote`. The new count arrives as a push event.
    async fn vote(&self, id: &MemeId, vote_type: VoteType) -> Result<(), ApiError>;

    /// `POST /api/memes/{id}/bid`. The new bid state arrives as a push event.
    async fn bid(&self, id: &MemeId, bid: BidRequest) -> Result<(), ApiError>;

    /// `POST /api/memes/{id}/caption`. Returns the full updated meme.
    async fn generate_caption(&self, id: &MemeId) -> Result<Meme, ApiError>;
}

/// HTTP client for the marketplace API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn meme_path(id: &MemeId, action: &str) -> String {
        format!("/api/memes/{}/{}", urlencoding::encode(id.as_str()), action)
    }

    /// Make a GET request and decode the JSON response
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let text = send(self.client.get(self.url(path))).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make a POST request with a JSON body and decode the JSON response
    pub async fn post_json<TReq: Serialize + ?Sized, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let text = send(self.client.post(self.url(path)).json(body)).await?;
        if text.trim().is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    /// Make a POST request whose response body is only an acknowledgment
    pub async fn post_ack<TReq: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&TReq>,
    ) -> Result<(), ApiError> {
        let mut rb = self.client.post(self.url(path));
        if let Some(body) = body {
            rb = rb.json(body);
        }
        send(rb).await.map(|_| ())
    }
}

/// Send a request, returning the body of a 2xx response.
async fn send(rb: RequestBuilder) -> Result<String, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let resp = rb
        .header(HEADER_REQUEST_ID, &request_id)
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    let is_success = resp.status().is_success();
    let text = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

    if !is_success {
        crate::log_debug!(request_id = %request_id, status, "request failed");
        return Err(ApiError::Http { status, body: text });
    }

    crate::log_debug!(request_id = %request_id, status, "request completed");
    Ok(text)
}

#[async_trait]
impl MemeApi for ApiClient {
    async fn list_memes(&self) -> Result<Vec<Meme>, ApiError> {
        self.get_json("/api/memes").await
    }

    async fn leaderboard(&self, top: usize) -> Result<Vec<Meme>, ApiError> {
        self.get_json(&format!("/api/leaderboard?top={top}")).await
    }

    /// Any 2xx is a successful create, whatever the body says.
    async fn create_meme(&self, meme: &NewMeme) -> Result<Option<Meme>, ApiError> {
        let text = send(self.client.post(self.url("/api/memes")).json(meme)).await?;
        Ok(serde_json::from_str(&text).ok())
    }

    async fn vote(&self, id: &MemeId, vote_type: VoteType) -> Result<(), ApiError> {
        self.post_ack(&Self::meme_path(id, "vote"), Some(&VoteRequest { vote_type }))
            .await
    }

    async fn bid(&self, id: &MemeId, bid: BidRequest) -> Result<(), ApiError> {
        self.post_ack(&Self::meme_path(id, "bid"), Some(&bid)).await
    }

    async fn generate_caption(&self, id: &MemeId) -> Result<Meme, ApiError> {
        self.post_json(&Self::meme_path(id, "caption"), &serde_json::json!({}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path() {
        let client = ApiClient::new("http://localhost:5000/", None).unwrap();
        assert_eq!(client.url("/api/memes"), "http://localhost:5000/api/memes");
        assert_eq!(client.url("api/memes"), "http://localhost:5000/api/memes");
    }

    #[test]
    fn encodes_meme_ids_in_paths() {
        let id = MemeId::new("a b/c").unwrap();
        assert_eq!(ApiClient::meme_path(&id, "vote"), "/api/memes/a%20b%2Fc/vote");
    }
}
