//! Executor infrastructure errors
//!
//! Script failures are outcomes, not errors; these cover the cases where no
//! outcome could be produced at all.

use artifact_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("artifact storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("failed to launch script: {0}")]
    Spawn(String),
}
