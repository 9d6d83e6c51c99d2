//! Pull-based loads that seed and refresh the store.

use std::sync::Arc;

use memehustle_shared::{ApiError, Meme};

use crate::api_client::MemeApi;
use crate::error::ClientError;
use crate::stores::StoreHandle;

#[derive(Clone)]
pub struct SnapshotLoader {
    api: Arc<dyn MemeApi>,
}

impl SnapshotLoader {
    pub fn new(api: Arc<dyn MemeApi>) -> Self {
        Self { api }
    }

    /// Full collection, in server order.
    pub async fn load_all(&self) -> Result<Vec<Meme>, ApiError> {
        self.api.list_memes().await.inspect_err(|e| {
            crate::log_error!(error = %e, "failed to load memes");
        })
    }

    /// Up to `top` memes in leaderboard order.
    pub async fn load_top(&self, top: usize) -> Result<Vec<Meme>, ApiError> {
        let mut memes = self.api.leaderboard(top).await.inspect_err(|e| {
            crate::log_error!(error = %e, top, "failed to load leaderboard");
        })?;
        memes.truncate(top);
        Ok(memes)
    }

    /// Pull the full collection and replace the store with it.
    ///
    /// On failure the store keeps whatever it had.
    pub async fn refresh_all(&self, store: &StoreHandle) -> Result<(), ClientError> {
        let memes = self.load_all().await?;
        store.apply_snapshot(memes)?;
        store.flush().await
    }

    /// Pull the leaderboard and hand it to the store.
    pub async fn refresh_leaderboard(
        &self,
        store: &StoreHandle,
        top: usize,
    ) -> Result<(), ClientError> {
        let memes = self.load_top(top).await?;
        store.apply_leaderboard(memes, top)?;
        store.flush().await
    }
}
