//! Client-side meme state: the store, its merge rules, and the views derived
//! from it.

pub mod memes;
pub mod projection;
pub mod reconciler;

pub use memes::{Applied, MemeStore};
pub use projection::MemeProjection;
pub use reconciler::{spawn_reconciler, StoreCommand, StoreHandle};
