//! Push channel for real-time meme updates.
//!
//! ```text
//!   server ──ws──▶ connection task ──▶ EventChannel handlers ──▶ StoreHandle
//!                  (reconnect/backoff)   (per EventKind, in order)   (reconciler)
//! ```
//!
//! The channel only decodes frames and calls handlers; all meme state lives in
//! the store. [`crate::session::MemeSession`] registers the handlers that
//! forward each event kind into the store.

mod channel;
mod connection;

pub use channel::{EventChannel, EventHandler, SubscriptionId};
pub use connection::{ConnectionState, ReconnectConfig};
