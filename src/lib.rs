//! scry: compiles exploration results into Playwright scripts and repairs
//! them with a bounded diagnose/patch loop.
//!
//! The pipeline stages live in their own crates; this crate wires them into
//! the job model, the repair orchestrator and the service facade.

pub mod config;
pub mod errors;
pub mod job;
pub mod orchestrator;
pub mod service;

pub use config::{ConfigError, ScryConfig};
pub use errors::{ScryError, ScryResult};
pub use job::{
    submit_plan, AttemptOutcome, FailureReason, Job, JobArtifacts, JobState, JobStatus,
    RepairAttempt, TerminalResult,
};
pub use orchestrator::RepairOrchestrator;
pub use service::{collect_job_artifacts, ScryService};
