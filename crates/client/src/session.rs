//! Wires the push channel, snapshot loader, store and gateway together.
//!
//! A [`MemeSession`] is the one object a UI layer holds: it owns the store
//! (through its reconciler task), routes every push event kind into it, and
//! keeps the leaderboard and snapshot fresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use memehustle_shared::EventKind;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api_client::{ApiClient, MemeApi};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::MutationGateway;
use crate::snapshot::SnapshotLoader;
use crate::stores::{spawn_reconciler, MemeProjection, MemeStore, StoreHandle};
use crate::ws::{ConnectionState, EventChannel, SubscriptionId};

/// Pull-side refreshes shared by the session and its background tasks.
#[derive(Clone)]
struct Refresher {
    snapshots: SnapshotLoader,
    store: StoreHandle,
    leaderboard_top: usize,
    /// Set once any snapshot has been applied.
    loaded: Arc<AtomicBool>,
}

impl Refresher {
    async fn snapshot(&self) -> Result<(), ClientError> {
        self.snapshots.refresh_all(&self.store).await?;
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    async fn leaderboard(&self) -> Result<(), ClientError> {
        self.snapshots
            .refresh_leaderboard(&self.store, self.leaderboard_top)
            .await
    }

    fn loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

pub struct MemeSession {
    config: ClientConfig,
    channel: EventChannel,
    store: StoreHandle,
    refresher: Refresher,
    gateway: MutationGateway,
    subscriptions: Vec<SubscriptionId>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl MemeSession {
    /// Session talking to the HTTP API named in `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = ApiClient::new(config.api_url.as_str(), config.request_timeout)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Session over any [`MemeApi`] implementation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_api(config: ClientConfig, api: Arc<dyn MemeApi>) -> Self {
        let (store, _reconciler) = spawn_reconciler(MemeStore::new());
        let channel = EventChannel::new(config.ws_url.clone(), config.reconnect.clone());

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let store = store.clone();
                channel.subscribe(kind, move |event| {
                    if let Err(e) = store.apply_push(event.clone()) {
                        crate::log_warn!(%kind, error = %e, "push event not applied");
                    }
                })
            })
            .collect();

        let snapshots = SnapshotLoader::new(api.clone());
        Self {
            refresher: Refresher {
                snapshots,
                store: store.clone(),
                leaderboard_top: config.leaderboard_top,
                loaded: Arc::new(AtomicBool::new(false)),
            },
            gateway: MutationGateway::new(api, store.clone(), config.leaderboard_top),
            config,
            channel,
            store,
            subscriptions,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Start the resync and refresh tasks, connect the push channel, and
    /// load the initial snapshot and leaderboard.
    ///
    /// Fails only if the snapshot cannot be loaded. The session stays usable
    /// after a failure: the background tasks keep running and a later
    /// [`MemeSession::refresh`], reconnect or timer tick fills the store.
    pub async fn init(&self) -> Result<(), ClientError> {
        {
            let mut background = self.background.lock().unwrap_or_else(|p| p.into_inner());
            if background.is_empty() {
                if self.config.resync_on_reconnect {
                    background.push(self.spawn_resync());
                }
                if let Some(task) = self.spawn_leaderboard_timer() {
                    background.push(task);
                }
            }
        }

        self.channel.connect();
        self.refresher.snapshot().await?;
        if let Err(e) = self.refresh_leaderboard().await {
            crate::log_warn!(error = %e, "initial leaderboard load failed");
        }

        let view = self.store.current();
        crate::log_info!(
            memes = view.gallery.len(),
            leaderboard = view.leaderboard.len(),
            "meme session ready"
        );
        Ok(())
    }

    /// Re-pull both the snapshot and the leaderboard.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.refresher.snapshot().await?;
        self.refresh_leaderboard().await
    }

    pub async fn refresh_leaderboard(&self) -> Result<(), ClientError> {
        self.refresher.leaderboard().await
    }

    /// Whether any snapshot has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.refresher.loaded()
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Latest gallery and leaderboard.
    pub fn projection(&self) -> Arc<MemeProjection> {
        self.store.current()
    }

    /// Receiver notified whenever the gallery or leaderboard changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MemeProjection>> {
        self.store.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    /// Stop background tasks, drop the event handlers and close the channel.
    pub async fn shutdown(&self) {
        for task in self
            .background
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
        {
            task.abort();
        }
        for id in &self.subscriptions {
            self.channel.unsubscribe(*id);
        }
        self.channel.disconnect().await;
        crate::log_info!("meme session closed");
    }

    /// After the push channel joins again, events sent while it was down are
    /// lost, so re-pull everything. Driven by the join generation rather than
    /// the connection state so that an outage shorter than a resync is not
    /// missed.
    fn spawn_resync(&self) -> JoinHandle<()> {
        let mut generations = self.channel.watch_generation();
        let refresher = self.refresher.clone();

        tokio::spawn(async move {
            while generations.changed().await.is_ok() {
                let generation = *generations.borrow_and_update();
                // The first join is covered by the initial load.
                if generation < 2 {
                    continue;
                }
                crate::log_info!(generation, "push channel reconnected, resyncing");
                if let Err(e) = refresher.snapshot().await {
                    crate::log_warn!(error = %e, "resync snapshot failed");
                }
                if let Err(e) = refresher.leaderboard().await {
                    crate::log_warn!(error = %e, "resync leaderboard failed");
                }
            }
        })
    }

    fn spawn_leaderboard_timer(&self) -> Option<JoinHandle<()>> {
        let period = self.config.leaderboard_refresh?;
        let refresher = self.refresher.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately and init pulls on its own.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !refresher.loaded() {
                    if let Err(e) = refresher.snapshot().await {
                        crate::log_warn!(error = %e, "snapshot retry failed");
                    }
                }
                if let Err(e) = refresher.leaderboard().await {
                    crate::log_warn!(error = %e, "periodic leaderboard refresh failed");
                }
            }
        }))
    }
}

impl Drop for MemeSession {
    fn drop(&mut self) {
        for task in self
            .background
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
        {
            task.abort();
        }
    }
}
