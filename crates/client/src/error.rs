use memehustle_shared::{ApiError, ValidationError};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The reconciler task is gone; nothing can be applied any more.
    #[error("meme store is closed")]
    StoreClosed,
}
