//! Filesystem backend

mod reader;
mod writer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scry_core_types::{ArtifactRef, JobId};
use tracing::debug;

use crate::api::ArtifactStore;
use crate::errors::{StoreError, StoreResult};
use crate::layout::validate_key;

/// Stores artifacts as files below `root`
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

async fn blocking<T, F>(task: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| StoreError::Internal(err.to_string()))?
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<ArtifactRef> {
        let path = self.path_for(key)?;
        let size = bytes.len();
        blocking(move || writer::write_atomic(path, &bytes).map_err(StoreError::from)).await?;
        debug!(key, size, "artifact stored");
        Ok(ArtifactRef(key.to_string()))
    }

    async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        let path = self.path_for(artifact.as_str())?;
        let missing = artifact.clone();
        blocking(move || match reader::read_all(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(missing))
            }
            Err(err) => Err(err.into()),
        })
        .await
    }

    async fn list(&self, job: &JobId) -> StoreResult<Vec<ArtifactRef>> {
        validate_key(job.as_str())?;
        let root = self.root.clone();
        let prefix = job.as_str().to_string();
        blocking(move || {
            let mut keys = Vec::new();
            reader::collect_keys(&root.join(&prefix), &prefix, &mut keys)?;
            keys.sort();
            Ok(keys.into_iter().map(ArtifactRef).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{screenshot_key, script_key};

    #[tokio::test]
    async fn put_get_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let job = JobId::from("job-a");

        let script = store
            .put(&script_key(&job, 1), b"print('hi')".to_vec())
            .await
            .unwrap();
        store
            .put(&screenshot_key(&job, 1, "step-0.png"), vec![0x89, 0x50])
            .await
            .unwrap();
        store
            .put("job-b/attempt-1/script.py", b"other".to_vec())
            .await
            .unwrap();

        assert_eq!(store.get(&script).await.unwrap(), b"print('hi')".to_vec());
        assert!(dir.path().join("job-a/attempt-1/script.py").exists());
        assert!(!dir.path().join("job-a/attempt-1/script.tmp").exists());

        let listed = store.list(&job).await.unwrap();
        assert_eq!(
            listed,
            vec![
                ArtifactRef("job-a/attempt-1/screenshots/step-0.png".into()),
                ArtifactRef("job-a/attempt-1/script.py".into()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_artifacts_and_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let err = store
            .get(&ArtifactRef("nope/attempt-1/page.html".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.list(&JobId::from("nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let err = store.put("../escape.txt", vec![1]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
