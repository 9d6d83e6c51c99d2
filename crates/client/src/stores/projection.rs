//! Read-only views derived from the meme store.

use std::sync::Arc;

use memehustle_shared::{Meme, MemeId};

/// What the UI layer renders: the gallery and the leaderboard.
///
/// A new projection is published after every change to the store, so a
/// reader never sees a half-applied event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemeProjection {
    /// Bumped once per published projection.
    pub revision: u64,
    /// Every known meme, newest first.
    pub gallery: Vec<Arc<Meme>>,
    /// Last leaderboard pull, ranked by the server. Not re-sorted on votes.
    pub leaderboard: Vec<Arc<Meme>>,
}

impl MemeProjection {
    pub fn find(&self, id: &MemeId) -> Option<&Meme> {
        self.gallery.iter().find(|m| &m.id == id).map(Arc::as_ref)
    }

    pub fn gallery_ids(&self) -> Vec<&MemeId> {
        self.gallery.iter().map(|m| &m.id).collect()
    }

    pub fn leaderboard_ids(&self) -> Vec<&MemeId> {
        self.leaderboard.iter().map(|m| &m.id).collect()
    }

    /// Leaderboard entries with their 1-based rank.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Meme)> + '_ {
        self.leaderboard
            .iter()
            .enumerate()
            .map(|(i, m)| (i + 1, m.as_ref()))
    }
}
