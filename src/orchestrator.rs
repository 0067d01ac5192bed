//! Repair loop state machine
//!
//! Planning -> Optimizing -> Generating -> Executing -> (Succeeded |
//! Diagnosing -> (Patching -> Optimizing | Failed)). Every transition is
//! logged; every entry into Executing records exactly one attempt, and no
//! entry happens once the attempt budget is spent.

use std::sync::Arc;
use std::time::Duration;

use artifact_store::{ArtifactStore, StoreError};
use chrono::Utc;
use plan_optimizer::{OptimizeError, Optimizer};
use script_codegen::{CodeGenerator, GeneratedScript};
use script_executor::{ExecutionOutcome, ExecutionRequest, ScriptExecutor};
use scry_core_types::{FailureReport, Patch};
use self_heal::{
    ContentClassifier, ContentHint, Diagnoser, Diagnosis, DiagnosisInput, HeuristicDiagnoser,
    PatchEngine, PatchError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ScryConfig;
use crate::job::{
    AttemptOutcome, FailureReason, Job, JobState, JobStatus, RepairAttempt, TerminalResult,
};

/// Drives jobs through the repair loop
pub struct RepairOrchestrator {
    optimizer: Optimizer,
    generator: CodeGenerator,
    executor: Arc<dyn ScriptExecutor>,
    diagnoser: Arc<dyn Diagnoser>,
    engine: PatchEngine,
    store: Arc<dyn ArtifactStore>,
    classifier: Option<Arc<dyn ContentClassifier>>,
    max_attempts: u32,
    classifier_timeout: Duration,
    cancel: CancellationToken,
}

impl RepairOrchestrator {
    pub fn new(
        config: &ScryConfig,
        executor: Arc<dyn ScriptExecutor>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            optimizer: Optimizer::new(config.optimizer.clone()),
            generator: CodeGenerator::new(),
            executor,
            diagnoser: Arc::new(HeuristicDiagnoser::new(config.diagnoser.clone())),
            engine: PatchEngine::new(),
            store,
            classifier: None,
            max_attempts: config.max_repair_attempts.max(1),
            classifier_timeout: Duration::from_millis(config.diagnoser.classifier_timeout_ms),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_diagnoser(mut self, diagnoser: Arc<dyn Diagnoser>) -> Self {
        self.diagnoser = diagnoser;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Token checked between phases; cancelling it fails running jobs
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Runs `job` to a terminal state.
    ///
    /// A job that is already terminal is returned unchanged. A job interrupted
    /// after a failed attempt re-diagnoses that failure; any other intermediate
    /// phase restarts from Optimizing with its current patches.
    pub async fn run_repair_loop(&self, job: &mut Job) -> TerminalResult {
        if let Some(result) = job.terminal_result() {
            debug!(job_id = %job.id, "job already terminal");
            return result;
        }
        if job.state != JobState::Planning {
            let resume = match job.state {
                JobState::Diagnosing | JobState::Patching
                    if job.last_failure.is_some() && job.optimized.is_some() =>
                {
                    JobState::Diagnosing
                }
                _ => JobState::Optimizing,
            };
            warn!(
                job_id = %job.id,
                state = %job.state,
                resume_at = resume.name(),
                "resuming interrupted job"
            );
            job.state = resume;
        }

        let mut script: Option<GeneratedScript> = None;
        let mut proposed: Option<Patch> = None;

        while !job.state.is_terminal() {
            if self.cancel.is_cancelled() {
                self.transition(job, JobState::Failed(FailureReason::Cancelled));
                break;
            }
            let next = match job.state {
                JobState::Planning => JobState::Optimizing,
                JobState::Optimizing => self.optimize(job),
                JobState::Generating => self.generate(job, &mut script),
                JobState::Executing => self.execute(job, script.take()).await,
                JobState::Diagnosing => self.diagnose(job, &mut proposed).await,
                JobState::Patching => self.patch(job, proposed.take()),
                JobState::Succeeded | JobState::Failed(_) => break,
            };
            self.transition(job, next);
        }

        match job.terminal_result() {
            Some(result) => result,
            None => {
                // The loop only exits on terminal states.
                error!(job_id = %job.id, state = %job.state, "repair loop exited early");
                self.transition(
                    job,
                    JobState::Failed(FailureReason::FatalError("repair loop exited early".into())),
                );
                job.snapshot_result()
            }
        }
    }

    fn transition(&self, job: &mut Job, next: JobState) {
        info!(
            job_id = %job.id,
            attempt = job.attempts.len(),
            from = job.state.name(),
            to = %next,
            "job transition"
        );
        match &next {
            JobState::Succeeded => job.status = JobStatus::Succeeded,
            JobState::Failed(reason) => job.status = JobStatus::Failed(reason.clone()),
            _ => {}
        }
        job.state = next;
    }

    fn optimize(&self, job: &mut Job) -> JobState {
        match self.optimizer.optimize(&job.plan, Some(&job.patches)) {
            Ok(plan) => {
                job.optimized = Some(plan);
                JobState::Generating
            }
            Err(OptimizeError::NoActionableSteps) => {
                JobState::Failed(FailureReason::NoActionableSteps)
            }
            Err(err) => JobState::Failed(FailureReason::FatalError(err.to_string())),
        }
    }

    fn generate(&self, job: &Job, script: &mut Option<GeneratedScript>) -> JobState {
        let Some(plan) = job.optimized.as_ref() else {
            return fatal("no optimized plan to generate from");
        };
        match self.generator.generate(plan, &job.patches) {
            Ok(generated) => {
                debug!(job_id = %job.id, digest = %generated.digest, "script ready");
                *script = Some(generated);
                JobState::Executing
            }
            Err(err) => fatal(err),
        }
    }

    async fn execute(&self, job: &mut Job, script: Option<GeneratedScript>) -> JobState {
        let Some(script) = script else {
            return fatal("no generated script to execute");
        };
        if job.attempts.len() as u32 >= self.max_attempts {
            warn!(
                job_id = %job.id,
                max_attempts = self.max_attempts,
                "attempt budget spent before execution"
            );
            return JobState::Failed(FailureReason::MaxAttemptsExceeded);
        }
        let number = job.attempts.len() as u32 + 1;
        let started_at = Utc::now();
        let digest = script.digest.clone();
        let request = ExecutionRequest {
            job_id: job.id.clone(),
            attempt: number,
            script,
        };

        let report = match self.executor.execute(request).await {
            Ok(report) => report,
            Err(err) => {
                error!(job_id = %job.id, attempt = number, error = %err, "executor failed");
                job.attempts.push(RepairAttempt {
                    number,
                    patches: job.patches.clone(),
                    script_digest: digest,
                    script_ref: None,
                    outcome: AttemptOutcome::Aborted {
                        message: err.to_string(),
                    },
                    diagnosis: None,
                    artifacts: Vec::new(),
                    duration_ms: 0,
                    started_at,
                });
                return fatal(err);
            }
        };

        let outcome = match &report.outcome {
            ExecutionOutcome::Success { .. } => AttemptOutcome::Success,
            ExecutionOutcome::Failure(failure) => AttemptOutcome::from(failure),
        };
        info!(
            job_id = %job.id,
            attempt = number,
            duration_ms = report.duration_ms,
            success = report.outcome.is_success(),
            "attempt finished"
        );
        job.attempts.push(RepairAttempt {
            number,
            patches: job.patches.clone(),
            script_digest: digest,
            script_ref: Some(report.script_ref),
            outcome,
            diagnosis: None,
            artifacts: report.artifacts,
            duration_ms: report.duration_ms,
            started_at,
        });

        match report.outcome {
            ExecutionOutcome::Success { data } => {
                job.data = Some(data);
                job.last_failure = None;
                JobState::Succeeded
            }
            ExecutionOutcome::Failure(failure) => {
                job.last_failure = Some(failure);
                JobState::Diagnosing
            }
        }
    }

    async fn diagnose(&self, job: &mut Job, proposed: &mut Option<Patch>) -> JobState {
        let (Some(failure), Some(plan)) = (job.last_failure.as_ref(), job.optimized.as_ref())
        else {
            return fatal("nothing to diagnose");
        };

        let page_html = match self.load_page_html(failure).await {
            Ok(html) => html,
            Err(err) => {
                error!(job_id = %job.id, error = %err, "failure markup unreadable");
                return fatal(err);
            }
        };
        let hint = match page_html.as_deref() {
            Some(html) => self.classify(html).await,
            None => None,
        };

        let diagnosis = self.diagnoser.diagnose(&DiagnosisInput {
            failure,
            plan,
            patches: &job.patches,
            page_html: page_html.as_deref(),
            hint: hint.as_ref(),
        });
        info!(
            job_id = %job.id,
            signature = %failure.signature(),
            summary = diagnosis.summary(),
            "failure diagnosed"
        );
        if let Some(attempt) = job.attempts.last_mut() {
            attempt.diagnosis = Some(diagnosis.summary().to_string());
        }

        match diagnosis {
            Diagnosis::NoPatchAvailable { .. } => {
                JobState::Failed(FailureReason::NoPatchAvailable)
            }
            Diagnosis::Patch { .. } if job.attempts.len() as u32 >= self.max_attempts => {
                warn!(
                    job_id = %job.id,
                    max_attempts = self.max_attempts,
                    "repair budget exhausted"
                );
                JobState::Failed(FailureReason::MaxAttemptsExceeded)
            }
            Diagnosis::Patch { patch, .. } => {
                *proposed = Some(patch);
                JobState::Patching
            }
        }
    }

    fn patch(&self, job: &mut Job, proposed: Option<Patch>) -> JobState {
        let Some(patch) = proposed else {
            return fatal("no patch to apply");
        };
        match self.engine.merge(&job.patches, patch) {
            Ok(patches) => {
                job.patches = patches;
                JobState::Optimizing
            }
            Err(PatchError::AlreadyTried(signature)) => {
                warn!(job_id = %job.id, %signature, "patch already tried");
                JobState::Failed(FailureReason::NoPatchAvailable)
            }
        }
    }

    /// Missing markup degrades diagnosis; an unreachable store does not.
    async fn load_page_html(&self, failure: &FailureReport) -> Result<Option<String>, StoreError> {
        let Some(html_ref) = failure.html.as_ref() else {
            return Ok(None);
        };
        match self.store.get(html_ref).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err @ (StoreError::NotFound(_) | StoreError::InvalidKey(_))) => {
                warn!(artifact = %html_ref, error = %err, "failure markup unavailable");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn classify(&self, html: &str) -> Option<ContentHint> {
        let classifier = self.classifier.as_ref()?;
        match tokio::time::timeout(self.classifier_timeout, classifier.classify(html)).await {
            Ok(Ok(hint)) => Some(hint),
            Ok(Err(err)) => {
                warn!(error = %err, "content classifier failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.classifier_timeout.as_millis() as u64,
                    "content classifier timed out"
                );
                None
            }
        }
    }
}

fn fatal(err: impl ToString) -> JobState {
    JobState::Failed(FailureReason::FatalError(err.to_string()))
}
