//! Single-consumer task that owns the [`MemeStore`].
//!
//! Push-event handlers, snapshot pulls and caption responses all enqueue a
//! [`StoreCommand`]; the task applies them one at a time in queue order and
//! publishes a fresh [`MemeProjection`] whenever the store changed.

use std::sync::Arc;

use memehustle_shared::{Meme, PushEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::memes::{Applied, MemeStore};
use super::projection::MemeProjection;
use crate::error::ClientError;

#[derive(Debug)]
pub enum StoreCommand {
    Snapshot(Vec<Meme>),
    Leaderboard { memes: Vec<Meme>, top: usize },
    Push(PushEvent),
    CaptionResult(Meme),
    /// Resolves once every command queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the reconciler task.
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::UnboundedSender<StoreCommand>,
    projection: watch::Receiver<Arc<MemeProjection>>,
}

impl StoreHandle {
    fn send(&self, cmd: StoreCommand) -> Result<(), ClientError> {
        self.commands.send(cmd).map_err(|_| ClientError::StoreClosed)
    }

    pub fn apply_snapshot(&self, memes: Vec<Meme>) -> Result<(), ClientError> {
        self.send(StoreCommand::Snapshot(memes))
    }

    pub fn apply_leaderboard(&self, memes: Vec<Meme>, top: usize) -> Result<(), ClientError> {
        self.send(StoreCommand::Leaderboard { memes, top })
    }

    pub fn apply_push(&self, event: PushEvent) -> Result<(), ClientError> {
        self.send(StoreCommand::Push(event))
    }

    pub fn apply_caption_result(&self, meme: Meme) -> Result<(), ClientError> {
        self.send(StoreCommand::CaptionResult(meme))
    }

    /// Wait until everything queued so far has been applied.
    pub async fn flush(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(StoreCommand::Flush(tx))?;
        rx.await.map_err(|_| ClientError::StoreClosed)
    }

    /// Latest published projection.
    pub fn current(&self) -> Arc<MemeProjection> {
        self.projection.borrow().clone()
    }

    /// Receiver notified on every published projection.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MemeProjection>> {
        self.projection.clone()
    }
}

/// Start the reconciler task. It stops once every [`StoreHandle`] is dropped.
pub fn spawn_reconciler(store: MemeStore) -> (StoreHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::unbounded_channel();
    let (publisher, projection) = watch::channel(Arc::new(store.projection(0)));
    let task = tokio::spawn(run(store, rx, publisher));
    (
        StoreHandle {
            commands,
            projection,
        },
        task,
    )
}

async fn run(
    mut store: MemeStore,
    mut rx: mpsc::UnboundedReceiver<StoreCommand>,
    publisher: watch::Sender<Arc<MemeProjection>>,
) {
    let mut revision = 0u64;

    while let Some(cmd) = rx.recv().await {
        let applied = match cmd {
            StoreCommand::Snapshot(memes) => {
                crate::log_info!(count = memes.len(), "applying snapshot");
                store.apply_snapshot(memes)
            }
            StoreCommand::Leaderboard { memes, top } => store.apply_leaderboard(memes, top),
            StoreCommand::Push(event) => {
                let kind = event.kind();
                let meme_id = event.meme_id().clone();
                let applied = store.apply_push(event);
                if applied == Applied::UnknownId {
                    crate::log_debug!(%kind, %meme_id, "dropping event for unknown meme");
                }
                applied
            }
            StoreCommand::CaptionResult(meme) => {
                let meme_id = meme.id.clone();
                let applied = store.apply_caption_result(meme);
                if applied == Applied::UnknownId {
                    crate::log_debug!(%meme_id, "dropping caption for unknown meme");
                }
                applied
            }
            StoreCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        if applied.changed() {
            revision += 1;
            publisher.send_replace(Arc::new(store.projection(revision)));
        }
    }

    crate::log_debug!("meme store closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use memehustle_shared::{MemeId, VoteUpdate};

    fn meme(raw: &str) -> Meme {
        Meme::new(MemeId::new(raw).unwrap(), raw.to_uppercase())
    }

    #[tokio::test]
    async fn applies_commands_in_queue_order() {
        let (store, _task) = spawn_reconciler(MemeStore::new());
        store.apply_snapshot(vec![meme("a")]).unwrap();
        store.apply_push(PushEvent::Created(meme("b"))).unwrap();
        store
            .apply_push(PushEvent::VoteUpdate(VoteUpdate {
                meme_id: MemeId::new("b").unwrap(),
                upvotes: 5,
            }))
            .unwrap();
        store
            .apply_push(PushEvent::VoteUpdate(VoteUpdate {
                meme_id: MemeId::new("b").unwrap(),
                upvotes: 4,
            }))
            .unwrap();
        store.flush().await.unwrap();

        let view = store.current();
        let ids: Vec<&str> = view.gallery.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(view.gallery[0].upvotes, 4);
    }

    #[tokio::test]
    async fn publishes_only_on_change() {
        let (store, _task) = spawn_reconciler(MemeStore::new());
        let mut rx = store.subscribe();
        let _ = rx.borrow_and_update();

        store.apply_snapshot(vec![meme("a")]).unwrap();
        store.flush().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let first = rx.borrow_and_update().revision;

        store.apply_push(PushEvent::Created(meme("a"))).unwrap();
        store
            .apply_push(PushEvent::VoteUpdate(VoteUpdate {
                meme_id: MemeId::new("ghost").unwrap(),
                upvotes: 1,
            }))
            .unwrap();
        store.flush().await.unwrap();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.current().revision, first);
    }

    #[tokio::test]
    async fn closed_store_reports_error() {
        let (store, task) = spawn_reconciler(MemeStore::new());
        task.abort();
        let _ = task.await;
        assert_eq!(store.apply_push(PushEvent::Created(meme("a"))), Err(ClientError::StoreClosed));
        assert_eq!(store.flush().await, Err(ClientError::StoreClosed));
    }
}
