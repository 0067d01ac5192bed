//! Scrape plan intermediate representation
//!
//! A plan is an ordered list of closed step variants built from the raw
//! action records of an exploration run. Every later stage (optimizer,
//! code generator, executor) matches exhaustively on [`PlanStep`], so a new
//! step kind is a compile-time change across the pipeline.

pub mod builder;
pub mod errors;
pub mod exploration;
pub mod extraction;
pub mod types;

pub use builder::build_plan;
pub use errors::ValidationError;
pub use exploration::{ExplorationResult, RawAction, StepMetadata};
pub use extraction::{ExtractionSpec, FieldSpec};
pub use types::{
    ElementHint, FillValue, PlanStep, PlannedStep, ScrapePlan, StepKind, ValidationType,
    WaitState, DEFAULT_WAIT_TIMEOUT_MS,
};
