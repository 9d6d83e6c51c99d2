//! MemeHustle Client - real-time sync engine
//!
//! Keeps a local view of the meme marketplace (gallery and leaderboard) in
//! step with the server by combining REST snapshot pulls with push events
//! from the WebSocket channel. Mutations go out over REST and their effects
//! come back as push events.

pub mod api_client;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod session;
pub mod snapshot;
pub mod stores;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use api_client::{ApiClient, MemeApi};
pub use config::ClientConfig;
pub use error::ClientError;
pub use gateway::MutationGateway;
pub use session::MemeSession;
pub use snapshot::SnapshotLoader;
pub use stores::{MemeProjection, StoreHandle};
pub use ws::{ConnectionState, EventChannel};
