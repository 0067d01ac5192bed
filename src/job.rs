//! Job records
//!
//! A [`Job`] is created from an exploration result and afterwards mutated
//! only by the repair orchestrator. Everything here serializes so a job can
//! be reported by the CLI as-is.

use std::fmt;

use artifact_store::ArtifactKind;
use chrono::{DateTime, Utc};
use plan_ir::{build_plan, ExplorationResult, ScrapePlan, ValidationError};
use scry_core_types::{ArtifactRef, FailureKind, FailureReport, JobId, PatchSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a job ended without data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    MaxAttemptsExceeded,
    NoPatchAvailable,
    NoActionableSteps,
    FatalError(String),
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MaxAttemptsExceeded => f.write_str("max repair attempts exceeded"),
            FailureReason::NoPatchAvailable => f.write_str("no patch available"),
            FailureReason::NoActionableSteps => f.write_str("no actionable steps"),
            FailureReason::FatalError(message) => write!(f, "fatal error: {message}"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Phase of the repair loop a job is in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Planning,
    Optimizing,
    Generating,
    Executing,
    Diagnosing,
    Patching,
    Succeeded,
    Failed(FailureReason),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Planning => "planning",
            JobState::Optimizing => "optimizing",
            JobState::Generating => "generating",
            JobState::Executing => "executing",
            JobState::Diagnosing => "diagnosing",
            JobState::Patching => "patching",
            JobState::Succeeded => "succeeded",
            JobState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed(FailureReason),
}

/// How one executed attempt ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure {
        kind: FailureKind,
        step_index: Option<usize>,
        message: String,
    },
    /// The executor itself failed; nothing was classified
    Aborted { message: String },
}

impl From<&FailureReport> for AttemptOutcome {
    fn from(report: &FailureReport) -> Self {
        AttemptOutcome::Failure {
            kind: report.kind,
            step_index: report.step_index,
            message: report.message.clone(),
        }
    }
}

/// Audit record of one entry into Executing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    /// 1-based
    pub number: u32,
    /// Patch set the attempt's script was generated with
    pub patches: PatchSet,
    pub script_digest: String,
    pub script_ref: Option<ArtifactRef>,
    pub outcome: AttemptOutcome,
    /// Filled in once the failure has been diagnosed
    pub diagnosis: Option<String>,
    pub artifacts: Vec<ArtifactRef>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl RepairAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub(crate) id: JobId,
    pub(crate) state: JobState,
    pub(crate) status: JobStatus,
    pub(crate) plan: ScrapePlan,
    pub(crate) optimized: Option<ScrapePlan>,
    pub(crate) patches: PatchSet,
    pub(crate) attempts: Vec<RepairAttempt>,
    pub(crate) data: Option<Value>,
    pub(crate) last_failure: Option<FailureReport>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(plan: ScrapePlan) -> Self {
        Self {
            id: JobId::new(),
            state: JobState::Planning,
            status: JobStatus::Pending,
            plan,
            optimized: None,
            patches: PatchSet::new(),
            attempts: Vec::new(),
            data: None,
            last_failure: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn plan(&self) -> &ScrapePlan {
        &self.plan
    }

    /// Plan of the most recent optimization pass
    pub fn optimized_plan(&self) -> Option<&ScrapePlan> {
        self.optimized.as_ref()
    }

    pub fn patches(&self) -> &PatchSet {
        &self.patches
    }

    pub fn attempts(&self) -> &[RepairAttempt] {
        &self.attempts
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn last_failure(&self) -> Option<&FailureReport> {
        self.last_failure.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Result view of a terminal job; `None` while the loop is still running
    pub fn terminal_result(&self) -> Option<TerminalResult> {
        self.is_terminal().then(|| self.snapshot_result())
    }

    pub(crate) fn snapshot_result(&self) -> TerminalResult {
        let reason = match &self.status {
            JobStatus::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        TerminalResult {
            job_id: self.id.clone(),
            status: self.status.clone(),
            reason,
            data: self.data.clone(),
            script_ref: self
                .attempts
                .last()
                .and_then(|attempt| attempt.script_ref.clone()),
            attempts: self.attempts.clone(),
        }
    }
}

/// Builds the raw plan for an exploration and wraps it in a pending job
pub fn submit_plan(exploration: &ExplorationResult) -> Result<Job, ValidationError> {
    let plan = build_plan(exploration)?;
    Ok(Job::new(plan))
}

/// Final report of a repair loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub reason: Option<FailureReason>,
    pub data: Option<Value>,
    /// Script of the last attempt
    pub script_ref: Option<ArtifactRef>,
    pub attempts: Vec<RepairAttempt>,
}

impl TerminalResult {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Stored artifacts of a job, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArtifacts {
    pub job_id: JobId,
    pub screenshots: Vec<ArtifactRef>,
    pub html_snapshots: Vec<ArtifactRef>,
    pub data: Vec<ArtifactRef>,
    /// Script of the highest-numbered attempt
    pub script: Option<ArtifactRef>,
}

impl JobArtifacts {
    /// Groups a sorted key listing of one job
    pub fn from_listing(job_id: JobId, listing: Vec<ArtifactRef>) -> Self {
        let mut grouped = JobArtifacts {
            job_id,
            ..JobArtifacts::default()
        };
        let mut latest_script: Option<(u32, ArtifactRef)> = None;
        for artifact in listing {
            match ArtifactKind::of(&artifact) {
                ArtifactKind::Screenshot => grouped.screenshots.push(artifact),
                ArtifactKind::PageHtml => grouped.html_snapshots.push(artifact),
                ArtifactKind::Data => grouped.data.push(artifact),
                ArtifactKind::Script => {
                    let attempt = artifact_store::layout::attempt_of(&artifact).unwrap_or(0);
                    if latest_script.as_ref().map_or(true, |(n, _)| attempt >= *n) {
                        latest_script = Some((attempt, artifact));
                    }
                }
                ArtifactKind::Other => {}
            }
        }
        grouped.script = latest_script.map(|(_, artifact)| artifact);
        grouped
    }

    pub fn is_empty(&self) -> bool {
        self.screenshots.is_empty()
            && self.html_snapshots.is_empty()
            && self.data.is_empty()
            && self.script.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_ir::RawAction;

    #[test]
    fn submitted_job_is_pending() {
        let exploration = ExplorationResult::new(vec![
            RawAction::navigate("https://shop.test"),
            RawAction::click("button.buy"),
        ]);
        let job = submit_plan(&exploration).unwrap();
        assert_eq!(job.state(), &JobState::Planning);
        assert_eq!(job.status(), &JobStatus::Pending);
        assert_eq!(job.plan().len(), 2);
        assert!(job.terminal_result().is_none());
    }

    #[test]
    fn empty_exploration_rejected() {
        assert!(submit_plan(&ExplorationResult::default()).is_err());
    }

    #[test]
    fn listing_groups_by_kind() {
        let job = JobId::from("job-1");
        let listing = vec![
            ArtifactRef("job-1/attempt-1/page.html".into()),
            ArtifactRef("job-1/attempt-1/screenshots/step-0.png".into()),
            ArtifactRef("job-1/attempt-1/script.py".into()),
            ArtifactRef("job-1/attempt-2/data.json".into()),
            ArtifactRef("job-1/attempt-2/screenshots/step-0.png".into()),
            ArtifactRef("job-1/attempt-2/script.py".into()),
        ];
        let grouped = JobArtifacts::from_listing(job, listing);
        assert_eq!(grouped.screenshots.len(), 2);
        assert_eq!(grouped.html_snapshots.len(), 1);
        assert_eq!(grouped.data.len(), 1);
        assert_eq!(
            grouped.script,
            Some(ArtifactRef("job-1/attempt-2/script.py".into()))
        );
    }

    #[test]
    fn failure_reason_serializes_tagged() {
        let json = serde_json::to_value(FailureReason::FatalError("disk full".into())).unwrap();
        assert_eq!(json["reason"], "fatal_error");
        assert_eq!(json["detail"], "disk full");
    }
}
