//! Script execution
//!
//! [`ProcessScriptExecutor`] runs one generated script per call as a child
//! process, persists what it produced under `{job_id}/attempt-{n}/` and
//! reduces the run to an [`ExecutionOutcome`].

pub mod config;
pub mod errors;
pub mod events;
pub mod process;
pub mod types;

pub use config::ExecutorConfig;
pub use errors::ExecutorError;
pub use events::{EventLog, ScriptEvent};
pub use process::ProcessScriptExecutor;
pub use types::{ExecutionOutcome, ExecutionReport, ExecutionRequest, ScriptExecutor};
