//! Mutation requests: create, vote, bid, caption.
//!
//! None of these write to the store on success except caption generation,
//! whose response body is the only place its result appears. Votes, bids and
//! creations become visible when the matching push event arrives.

use std::sync::Arc;

use memehustle_shared::{BidRequest, Meme, MemeId, NewMeme, VoteType};

use crate::api_client::MemeApi;
use crate::error::ClientError;
use crate::snapshot::SnapshotLoader;
use crate::stores::StoreHandle;

#[derive(Clone)]
pub struct MutationGateway {
    api: Arc<dyn MemeApi>,
    snapshots: SnapshotLoader,
    store: StoreHandle,
    leaderboard_top: usize,
}

impl MutationGateway {
    pub fn new(api: Arc<dyn MemeApi>, store: StoreHandle, leaderboard_top: usize) -> Self {
        Self {
            snapshots: SnapshotLoader::new(api.clone()),
            api,
            store,
            leaderboard_top,
        }
    }

    /// Create a meme, then refresh the leaderboard.
    ///
    /// The gallery picks the meme up from its `meme_created` event. A failed
    /// leaderboard refresh is logged but does not fail the creation.
    pub async fn create(&self, meme: NewMeme) -> Result<Option<Meme>, ClientError> {
        meme.validate()?;
        let created = self.api.create_meme(&meme).await.inspect_err(|e| {
            crate::log_error!(title = %meme.title, error = %e, "error creating meme");
        })?;
        crate::log_info!(
            title = %meme.title,
            meme_id = %created.as_ref().map(|m| m.id.to_string()).unwrap_or_default(),
            "meme created"
        );

        if let Err(e) = self
            .snapshots
            .refresh_leaderboard(&self.store, self.leaderboard_top)
            .await
        {
            crate::log_warn!(error = %e, "leaderboard refresh after create failed");
        }
        Ok(created)
    }

    pub async fn vote(&self, id: &MemeId, vote_type: VoteType) -> Result<(), ClientError> {
        self.api.vote(id, vote_type).await.map_err(|e| {
            crate::log_error!(meme_id = %id, %vote_type, error = %e, "error voting");
            e.into()
        })
    }

    /// Place a bid of `credits`. Zero is rejected before any request is sent.
    pub async fn bid(&self, id: &MemeId, credits: u64) -> Result<(), ClientError> {
        let bid = BidRequest::new(credits)?;
        self.api.bid(id, bid).await.map_err(|e| {
            crate::log_error!(meme_id = %id, credits, error = %e, "error placing bid");
            e.into()
        })
    }

    /// Ask the server for an AI caption and merge the result into the store.
    pub async fn generate_caption(&self, id: &MemeId) -> Result<Meme, ClientError> {
        let meme = self.api.generate_caption(id).await.inspect_err(|e| {
            crate::log_error!(meme_id = %id, error = %e, "error generating caption");
        })?;
        self.store.apply_caption_result(meme.clone())?;
        Ok(meme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{spawn_reconciler, MemeStore};
    use crate::testing::FakeApi;
    use memehustle_shared::{ApiError, ValidationError};

    fn id(raw: &str) -> MemeId {
        MemeId::new(raw).unwrap()
    }

    fn setup(api: Arc<FakeApi>) -> (MutationGateway, StoreHandle) {
        let (store, _task) = spawn_reconciler(MemeStore::new());
        (MutationGateway::new(api, store.clone(), 2), store)
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_server() {
        let api = Arc::new(FakeApi::default());
        let (gateway, _store) = setup(api.clone());

        let err = gateway.create(NewMeme::new("", vec!["x".into()])).await;
        assert_eq!(err, Err(ClientError::Validation(ValidationError::EmptyTitle)));
        let err = gateway.create(NewMeme::new("Doge", vec![])).await;
        assert_eq!(err, Err(ClientError::Validation(ValidationError::NoTags)));
        let err = gateway.bid(&id("1"), 0).await;
        assert_eq!(err, Err(ClientError::Validation(ValidationError::NonPositiveBid)));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn create_refreshes_leaderboard_but_not_gallery() {
        let api = Arc::new(FakeApi::default());
        api.set_leaderboard(vec![
            Meme::new(id("a"), "A"),
            Meme::new(id("b"), "B"),
            Meme::new(id("c"), "C"),
        ]);
        let (gateway, store) = setup(api.clone());

        gateway
            .create(NewMeme::new("Doge", vec!["crypto".into()]))
            .await
            .unwrap();

        let view = store.current();
        assert!(view.gallery.is_empty());
        let board: Vec<&str> = view.leaderboard.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(board, vec!["a", "b"]);
        assert_eq!(api.calls(), vec!["create Doge", "leaderboard 2"]);
    }

    #[tokio::test]
    async fn create_survives_leaderboard_failure() {
        let api = Arc::new(FakeApi::default());
        api.fail_leaderboard(true);
        let (gateway, store) = setup(api.clone());

        let created = gateway
            .create(NewMeme::new("Doge", vec!["crypto".into()]))
            .await;
        assert!(created.is_ok());
        assert!(store.current().leaderboard.is_empty());
    }

    #[tokio::test]
    async fn votes_and_bids_do_not_touch_the_store() {
        let api = Arc::new(FakeApi::default());
        let (gateway, store) = setup(api.clone());
        store.apply_snapshot(vec![Meme::new(id("1"), "Doge")]).unwrap();
        store.flush().await.unwrap();
        let before = store.current();

        gateway.vote(&id("1"), VoteType::Up).await.unwrap();
        gateway.bid(&id("1"), 25).await.unwrap();
        store.flush().await.unwrap();

        assert_eq!(store.current(), before);
        assert_eq!(api.calls(), vec!["vote 1 up", "bid 1 25"]);
    }

    #[tokio::test]
    async fn request_failures_are_reported() {
        let api = Arc::new(FakeApi::default());
        api.fail_mutations(true);
        let (gateway, _store) = setup(api.clone());

        let err = gateway.vote(&id("1"), VoteType::Down).await.unwrap_err();
        assert!(matches!(err, ClientError::Api(ApiError::Http { status: 503, .. })));
        assert!(gateway.generate_caption(&id("1")).await.is_err());
    }

    #[tokio::test]
    async fn caption_result_is_merged() {
        let api = Arc::new(FakeApi::default());
        let mut captioned = Meme::new(id("1"), "Doge");
        captioned.caption = Some("Much wow".into());
        captioned.vibe = Some("Neon Crypto Chaos".into());
        api.set_caption(captioned);
        let (gateway, store) = setup(api.clone());

        let mut current = Meme::new(id("1"), "Doge");
        current.upvotes = 9;
        store.apply_snapshot(vec![current]).unwrap();

        gateway.generate_caption(&id("1")).await.unwrap();
        store.flush().await.unwrap();

        let view = store.current();
        let meme = view.find(&id("1")).unwrap();
        assert_eq!(meme.caption.as_deref(), Some("Much wow"));
        assert_eq!(meme.upvotes, 9);
    }
}
