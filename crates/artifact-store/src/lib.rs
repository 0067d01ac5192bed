//! Artifact storage for repair attempts
//!
//! Every attempt writes under `{job_id}/attempt-{n}/`; keys are relative,
//! `/`-separated and never leave the store root.

pub mod api;
pub mod errors;
pub mod fs;
pub mod layout;
pub mod memory;

pub use api::ArtifactStore;
pub use errors::{StoreError, StoreResult};
pub use fs::FsArtifactStore;
pub use layout::ArtifactKind;
pub use memory::MemoryArtifactStore;
