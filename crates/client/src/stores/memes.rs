//! The meme store: every meme this client knows about, keyed by id.
//!
//! The store is the single place where push events, snapshot pulls and
//! mutation responses meet. Each `apply_*` method is one merge rule:
//!
//! | input            | rule                                                     |
//! |------------------|----------------------------------------------------------|
//! | snapshot         | total overwrite of memes and gallery order               |
//! | `meme_created`   | insert at the head of the gallery, ignore known ids      |
//! | `vote_update`    | overwrite `upvotes`; last applied wins                   |
//! | `bid_update`     | monotonic max on `highest_bid`, bidder follows the max   |
//! | caption response | field merge of `caption` and `vibe` only                 |
//!
//! Events for ids the store has never seen are dropped, not buffered.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use memehustle_shared::{BidUpdate, Meme, MemeId, PushEvent, VoteUpdate};

use super::projection::MemeProjection;

/// What an `apply_*` call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// The target exists but the merge rule left it as it was.
    Unchanged,
    /// The event names an id the store does not hold; it was dropped.
    UnknownId,
}

impl Applied {
    pub fn changed(self) -> bool {
        matches!(self, Applied::Changed)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemeStore {
    /// Shared with published projections; a merge copies only the meme it
    /// touches.
    memes: HashMap<MemeId, Arc<Meme>>,
    /// Gallery order, newest first. Kept apart from the map so field updates
    /// never move an entry.
    order: VecDeque<MemeId>,
    /// Last leaderboard pulled from the server, already truncated.
    leaderboard: Vec<Arc<Meme>>,
}

impl MemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.memes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memes.is_empty()
    }

    pub fn get(&self, id: &MemeId) -> Option<&Meme> {
        self.memes.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &MemeId) -> bool {
        self.memes.contains_key(id)
    }

    /// Memes in gallery order, newest first.
    pub fn gallery(&self) -> impl Iterator<Item = &Meme> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.memes.get(id))
            .map(Arc::as_ref)
    }

    pub fn leaderboard(&self) -> &[Arc<Meme>] {
        &self.leaderboard
    }

    /// Replace the whole collection with a snapshot, keeping its order.
    ///
    /// If the snapshot repeats an id, the first occurrence wins.
    pub fn apply_snapshot(&mut self, memes: Vec<Meme>) -> Applied {
        self.memes.clear();
        self.order.clear();
        for meme in memes {
            if self.memes.contains_key(&meme.id) {
                crate::log_warn!(meme_id = %meme.id, "snapshot repeats a meme id, keeping the first");
                continue;
            }
            self.order.push_back(meme.id.clone());
            self.memes.insert(meme.id.clone(), Arc::new(meme));
        }
        Applied::Changed
    }

    /// Insert a newly created meme. Idempotent: a known id is left untouched.
    pub fn apply_created(&mut self, meme: Meme) -> Applied {
        if self.memes.contains_key(&meme.id) {
            return Applied::Unchanged;
        }
        self.order.push_front(meme.id.clone());
        self.memes.insert(meme.id.clone(), Arc::new(meme));
        Applied::Changed
    }

    /// Overwrite the upvote count with the server's value.
    ///
    /// This is an assignment, not a delta. Two updates delivered out of order
    /// leave the older count in place; the protocol carries no version to
    /// detect that.
    pub fn apply_vote_update(&mut self, id: &MemeId, upvotes: u64) -> Applied {
        let Some(meme) = self.memes.get_mut(id) else {
            return Applied::UnknownId;
        };
        if meme.upvotes == upvotes {
            return Applied::Unchanged;
        }
        Arc::make_mut(meme).upvotes = upvotes;
        Applied::Changed
    }

    /// Merge a bid: the highest bid only grows, and the bidder changes only
    /// when a bid strictly exceeds the current one.
    ///
    /// Repeating or reordering bid events converges on the same state, so no
    /// sequencing is needed. Equal bids from different bidders keep whichever
    /// was applied first.
    pub fn apply_bid_update(&mut self, id: &MemeId, credits: u64, bidder_id: &str) -> Applied {
        let Some(meme) = self.memes.get_mut(id) else {
            return Applied::UnknownId;
        };
        if credits <= meme.current_bid() {
            return Applied::Unchanged;
        }
        let meme = Arc::make_mut(meme);
        meme.highest_bid = Some(credits);
        meme.highest_bidder = Some(bidder_id.to_string());
        Applied::Changed
    }

    /// Merge a caption-generation response.
    ///
    /// Only `caption` and `vibe` are taken from the response so that vote and
    /// bid updates applied while the request was in flight survive. Fields the
    /// response leaves out keep their current value.
    pub fn apply_caption_result(&mut self, result: Meme) -> Applied {
        let Some(meme) = self.memes.get_mut(&result.id) else {
            return Applied::UnknownId;
        };
        let caption = result.caption.or_else(|| meme.caption.clone());
        let vibe = result.vibe.or_else(|| meme.vibe.clone());
        if meme.caption == caption && meme.vibe == vibe {
            return Applied::Unchanged;
        }
        let meme = Arc::make_mut(meme);
        meme.caption = caption;
        meme.vibe = vibe;
        Applied::Changed
    }

    /// Dispatch a push event to its merge rule.
    pub fn apply_push(&mut self, event: PushEvent) -> Applied {
        match event {
            PushEvent::Created(meme) => self.apply_created(meme),
            PushEvent::VoteUpdate(VoteUpdate { meme_id, upvotes }) => {
                self.apply_vote_update(&meme_id, upvotes)
            }
            PushEvent::BidUpdate(BidUpdate {
                meme_id,
                credits,
                bidder_id,
            }) => self.apply_bid_update(&meme_id, credits, &bidder_id),
        }
    }

    /// Replace the held leaderboard with a fresh pull, keeping server order.
    pub fn apply_leaderboard(&mut self, mut memes: Vec<Meme>, top: usize) -> Applied {
        memes.truncate(top);
        if self.leaderboard.iter().map(Arc::as_ref).eq(memes.iter()) {
            return Applied::Unchanged;
        }
        self.leaderboard = memes.into_iter().map(Arc::new).collect();
        Applied::Changed
    }

    /// Immutable view handed to readers. Memes are shared, not copied.
    pub fn projection(&self, revision: u64) -> MemeProjection {
        MemeProjection {
            revision,
            gallery: self
                .order
                .iter()
                .filter_map(|id| self.memes.get(id).cloned())
                .collect(),
            leaderboard: self.leaderboard.clone(),
        }
    }
}
