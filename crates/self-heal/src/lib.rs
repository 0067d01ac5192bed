//! Self-heal: failure diagnosis and patch bookkeeping
//!
//! The [`Diagnoser`] maps one failed attempt to at most one patch from a
//! fixed catalog; the [`PatchEngine`] merges it into the job's history and
//! refuses any signature that was already tried.

pub mod classifier;
pub mod diagnoser;
pub mod engine;
pub mod errors;
pub mod policy;

pub use classifier::{ContentClassifier, ContentHint};
pub use diagnoser::{Diagnoser, Diagnosis, DiagnosisInput, HeuristicDiagnoser};
pub use engine::PatchEngine;
pub use errors::{ClassifierError, PatchError};
pub use policy::DiagnoserPolicy;
