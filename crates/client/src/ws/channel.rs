//! Typed subscriptions over the push channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use memehustle_shared::{decode_event_frame, EventKind, PushEvent};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

use super::connection::{run_connection_loop, ConnectionState, ReconnectConfig};

pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Returned by [`EventChannel::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
}

/// State shared between the channel and its connection task.
pub(super) struct Shared {
    subscriptions: Mutex<Subscriptions>,
    state: watch::Sender<ConnectionState>,
    /// Number of namespace joins so far. Unlike `state`, a reader that
    /// misses intermediate values still sees that a new connection happened.
    generation: watch::Sender<u64>,
}

impl Shared {
    fn subscriptions(&self) -> MutexGuard<'_, Subscriptions> {
        // Handlers run outside the lock, so a poisoned lock still holds a
        // consistent map.
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Record a fresh connection and publish it.
    pub(super) fn mark_connected(&self) {
        self.generation.send_modify(|generation| *generation += 1);
        self.set_state(ConnectionState::Connected);
    }

    /// Deliver a named event. Unknown names and bad payloads are dropped.
    pub(super) fn handle_event(&self, name: &str, payload: Value) {
        match PushEvent::from_named(name, payload) {
            Ok(event) => self.deliver(&event),
            Err(e) => crate::log_debug!(event = name, error = %e, "dropping malformed push event"),
        }
    }

    fn deliver(&self, event: &PushEvent) {
        let handlers: Vec<EventHandler> = self
            .subscriptions()
            .handlers
            .get(&event.kind())
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(event);
        }
    }
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Push channel adapter.
///
/// Handlers run on the connection task, one event at a time, in the order
/// the server sent them. The adapter keeps no meme state of its own.
pub struct EventChannel {
    url: Url,
    reconnect: ReconnectConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl EventChannel {
    pub fn new(url: Url, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (generation, _) = watch::channel(0);
        Self {
            url,
            reconnect,
            shared: Arc::new(Shared {
                subscriptions: Mutex::new(Subscriptions::default()),
                state,
                generation,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Register `handler` for every event of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut subs = self.shared.subscriptions();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.shared.subscriptions();
        let mut removed = false;
        for handlers in subs.handlers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sid, _)| *sid != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.shared
            .subscriptions()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to its subscribers as if it had arrived on the wire.
    pub fn inject(&self, event: &PushEvent) {
        self.shared.deliver(event);
    }

    /// Decode and deliver one raw `42[...]` event frame.
    pub fn inject_frame(&self, text: &str) {
        match decode_event_frame(text) {
            Ok(event) => self.shared.deliver(&event),
            Err(e) => crate::log_debug!(error = %e, "dropping malformed push frame"),
        }
    }

    /// Start the connection task. No-op while a task is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.as_ref().is_some_and(|w| !w.task.is_finished()) {
            return;
        }
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection_loop(
            self.url.clone(),
            self.reconnect.clone(),
            self.shared.clone(),
            shutdown_rx,
        ));
        *worker = Some(Worker { shutdown, task });
    }

    /// Close the socket and stop reconnecting. Subscriptions are kept.
    pub async fn disconnect(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(Worker { shutdown, task }) = worker {
            let _ = shutdown.send(());
            if let Err(e) = task.await {
                crate::log_warn!(error = %e, "push channel task ended abnormally");
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Record a join as if the server had accepted one.
    #[cfg(test)]
    pub(crate) fn simulate_join(&self) {
        self.shared.mark_connected();
    }

    /// How many times the channel has joined the server so far.
    pub fn generation(&self) -> u64 {
        *self.shared.generation.borrow()
    }

    /// Receiver notified each time the channel (re)joins the server.
    pub fn watch_generation(&self) -> watch::Receiver<u64> {
        self.shared.generation.subscribe()
    }
}
