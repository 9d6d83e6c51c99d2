//! In-memory [`MemeApi`] for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use memehustle_shared::{ApiError, BidRequest, Meme, MemeId, NewMeme, VoteType};

use crate::api_client::MemeApi;

#[derive(Default)]
struct FakeState {
    memes: Vec<Meme>,
    leaderboard: Vec<Meme>,
    caption: Option<Meme>,
    fail_list: bool,
    fail_leaderboard: bool,
    fail_mutations: bool,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

fn unavailable() -> ApiError {
    ApiError::Http {
        status: 503,
        body: r#"{"error":"unavailable"}"#.to_string(),
    }
}

impl FakeApi {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_memes(&self, memes: Vec<Meme>) {
        self.with(|s| s.memes = memes);
    }

    pub fn set_leaderboard(&self, memes: Vec<Meme>) {
        self.with(|s| s.leaderboard = memes);
    }

    pub fn set_caption(&self, meme: Meme) {
        self.with(|s| s.caption = Some(meme));
    }

    pub fn fail_list(&self, fail: bool) {
        self.with(|s| s.fail_list = fail);
    }

    pub fn fail_leaderboard(&self, fail: bool) {
        self.with(|s| s.fail_leaderboard = fail);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.with(|s| s.fail_mutations = fail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }
}

#[async_trait]
impl MemeApi for FakeApi {
    async fn list_memes(&self) -> Result<Vec<Meme>, ApiError> {
        self.with(|s| {
            s.calls.push("list".to_string());
            if s.fail_list {
                return Err(unavailable());
            }
            Ok(s.memes.clone())
        })
    }

    async fn leaderboard(&self, top: usize) -> Result<Vec<Meme>, ApiError> {
        self.with(|s| {
            s.calls.push(format!("leaderboard {top}"));
            if s.fail_leaderboard {
                return Err(unavailable());
            }
            Ok(s.leaderboard.clone())
        })
    }

    async fn create_meme(&self, meme: &NewMeme) -> Result<Option<Meme>, ApiError> {
        self.with(|s| {
            s.calls.push(format!("create {}", meme.title));
            if s.fail_mutations {
                return Err(unavailable());
            }
            Ok(None)
        })
    }

    async fn vote(&self, id: &MemeId, vote_type: VoteType) -> Result<(), ApiError> {
        self.with(|s| {
            s.calls.push(format!("vote {id} {vote_type}"));
            if s.fail_mutations {
                return Err(unavailable());
            }
            Ok(())
        })
    }

    async fn bid(&self, id: &MemeId, bid: BidRequest) -> Result<(), ApiError> {
        self.with(|s| {
            s.calls.push(format!("bid {id} {}", bid.credits));
            if s.fail_mutations {
                return Err(unavailable());
            }
            Ok(())
        })
    }

    async fn generate_caption(&self, id: &MemeId) -> Result<Meme, ApiError> {
        self.with(|s| {
            s.calls.push(format!("caption {id}"));
            if s.fail_mutations {
                return Err(unavailable());
            }
            s.caption
                .clone()
                .filter(|m| &m.id == id)
                .ok_or_else(|| ApiError::Http {
                    status: 404,
                    body: r#"{"error":"meme not found"}"#.to_string(),
                })
        })
    }
}
