//! Patch merge errors

use scry_core_types::PatchSignature;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A patch for this signature was already applied in the job
    #[error("patch for {0} already tried")]
    AlreadyTried(PatchSignature),
}

/// A content classifier could not produce a hint
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("content classifier failed: {0}")]
pub struct ClassifierError(pub String);
