//! Plan validation errors

use thiserror::Error;

/// Raised synchronously while building a plan, before anything executes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The exploration produced no actions at all
    #[error("plan has no steps")]
    EmptyPlan,

    /// Action kind outside the supported catalog
    #[error("step {index}: unrecognized action kind '{kind}'")]
    UnknownAction { index: usize, kind: String },

    /// A required field is absent or blank
    #[error("step {index}: {kind} requires a non-empty {field}")]
    MissingField {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    /// Navigate target with an unsupported scheme
    #[error("step {index}: unsupported url '{url}'")]
    InvalidUrl { index: usize, url: String },

    /// Field present but outside its allowed values
    #[error("step {index}: invalid {field} '{value}'")]
    InvalidValue {
        index: usize,
        field: &'static str,
        value: String,
    },
}

impl ValidationError {
    /// Index of the offending step, when the error is step-specific
    pub fn step_index(&self) -> Option<usize> {
        match self {
            ValidationError::EmptyPlan => None,
            ValidationError::UnknownAction { index, .. }
            | ValidationError::MissingField { index, .. }
            | ValidationError::InvalidUrl { index, .. }
            | ValidationError::InvalidValue { index, .. } => Some(*index),
        }
    }
}
