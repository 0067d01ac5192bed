use async_trait::async_trait;
use scry_core_types::{ArtifactRef, JobId};

use crate::errors::StoreResult;

/// Storage handle passed explicitly to the executor and the orchestrator
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any previous content
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<ArtifactRef>;

    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>>;

    /// Every artifact of `job`, sorted by key
    async fn list(&self, job: &JobId) -> StoreResult<Vec<ArtifactRef>>;
}
