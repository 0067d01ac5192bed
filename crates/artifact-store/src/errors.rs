use std::io;

use scry_core_types::ArtifactRef;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum StoreError {
    /// Key escapes the store root or is otherwise malformed
    #[error("invalid artifact key '{0}'")]
    InvalidKey(String),
    #[error("artifact not found: {0}")]
    NotFound(ArtifactRef),
    #[error("io failure: {0}")]
    Io(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
