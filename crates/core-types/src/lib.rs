mod patch;

pub use patch::{Patch, PatchAction, PatchKnobs, PatchSet};

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown failure kind '{0}'")]
pub struct UnknownFailureKind(pub String);

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Storage key of a persisted artifact, relative to the store root.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classified reason a generated script stopped short of success.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    SelectorNotFound,
    Timeout,
    NavigationError,
    ValidationFailed,
    UnhandledException,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SelectorNotFound => "selector_not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::NavigationError => "navigation_error",
            FailureKind::ValidationFailed => "validation_failed",
            FailureKind::UnhandledException => "unhandled_exception",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = UnknownFailureKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "selector_not_found" => Ok(FailureKind::SelectorNotFound),
            "timeout" => Ok(FailureKind::Timeout),
            "navigation_error" => Ok(FailureKind::NavigationError),
            "validation_failed" => Ok(FailureKind::ValidationFailed),
            "unhandled_exception" => Ok(FailureKind::UnhandledException),
            other => Err(UnknownFailureKind(other.to_string())),
        }
    }
}

/// The (failure kind, step index) pair a repair patch addresses.
///
/// A job applies at most one patch per signature; the step index is absent
/// when the failure happened outside any step (e.g. interpreter crash).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PatchSignature {
    pub failure: FailureKind,
    pub step_index: Option<usize>,
}

impl PatchSignature {
    pub fn new(failure: FailureKind, step_index: Option<usize>) -> Self {
        Self {
            failure,
            step_index,
        }
    }
}

impl fmt::Display for PatchSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_index {
            Some(index) => write!(f, "{}@{}", self.failure, index),
            None => write!(f, "{}@-", self.failure),
        }
    }
}

/// Classified failure of one executed attempt.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureReport {
    pub kind: FailureKind,
    /// Index of the failing step in the optimized plan
    pub step_index: Option<usize>,
    pub message: String,
    /// Last screenshot captured before the failure
    pub screenshot: Option<ArtifactRef>,
    /// Page markup captured at the failure
    pub html: Option<ArtifactRef>,
}

impl FailureReport {
    pub fn new(kind: FailureKind, step_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            step_index,
            message: message.into(),
            screenshot: None,
            html: None,
        }
    }

    pub fn signature(&self) -> PatchSignature {
        PatchSignature::new(self.kind, self.step_index)
    }
}
