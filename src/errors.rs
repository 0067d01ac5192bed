//! Error handling module
//!
//! Aggregates the pipeline crates' errors for callers of the service facade.
//! Inside the repair loop these errors become terminal job states instead of
//! propagating.

use artifact_store::StoreError;
use plan_ir::ValidationError;
use plan_optimizer::OptimizeError;
use script_codegen::CodegenError;
use script_executor::ExecutorError;
use scry_core_types::JobId;
use self_heal::PatchError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ScryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown job {0}")]
    JobNotFound(JobId),
}

pub type ScryResult<T> = Result<T, ScryError>;
