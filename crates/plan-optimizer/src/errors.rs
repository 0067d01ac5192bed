//! Optimizer errors

use plan_ir::ValidationError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    /// Every step was filtered out
    #[error("optimized plan has no actionable steps")]
    NoActionableSteps,

    #[error("optimized plan is invalid: {0}")]
    InvalidPlan(#[from] ValidationError),
}
