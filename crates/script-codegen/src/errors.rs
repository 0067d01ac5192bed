//! Code generation errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    /// The extraction spec could not be embedded in the script
    #[error("failed to encode extraction spec: {0}")]
    Extraction(#[from] serde_json::Error),
}
