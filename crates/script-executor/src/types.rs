use async_trait::async_trait;
use scry_core_types::{ArtifactRef, FailureReport, JobId};
use script_codegen::GeneratedScript;
use serde_json::Value;

use crate::errors::ExecutorError;

/// Result of running one script to completion (or to its timeout)
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success { data: Value },
    Failure(FailureReport),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        match self {
            ExecutionOutcome::Failure(report) => Some(report),
            ExecutionOutcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub job_id: JobId,
    pub attempt: u32,
    pub script: GeneratedScript,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub script_ref: ArtifactRef,
    /// Everything persisted for the attempt, script included
    pub artifacts: Vec<ArtifactRef>,
    pub duration_ms: u64,
}

/// Runs a generated script; never touches job state
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ExecutorError>;
}
