//! In-memory backend for tests and dry runs

use async_trait::async_trait;
use dashmap::DashMap;
use scry_core_types::{ArtifactRef, JobId};

use crate::api::ArtifactStore;
use crate::errors::{StoreError, StoreResult};
use crate::layout::validate_key;

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<ArtifactRef> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), bytes);
        Ok(ArtifactRef(key.to_string()))
    }

    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        self.entries
            .get(artifact.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(artifact.clone()))
    }

    async fn list(&self, job: &JobId) -> StoreResult<Vec<ArtifactRef>> {
        let prefix = format!("{}/", job.as_str());
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys.into_iter().map(ArtifactRef).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_the_requested_job() {
        let store = MemoryArtifactStore::new();
        store.put("a/attempt-1/script.py", vec![1]).await.unwrap();
        store.put("a/attempt-2/script.py", vec![2]).await.unwrap();
        store.put("ab/attempt-1/script.py", vec![3]).await.unwrap();

        let listed = store.list(&JobId::from("a")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(
            store.get(&listed[1]).await.unwrap(),
            vec![2],
        );
        assert!(matches!(
            store.get(&ArtifactRef("a/attempt-9/script.py".into())).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
