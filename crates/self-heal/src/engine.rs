//! Signature-guarded patch merging

use scry_core_types::{Patch, PatchSet};
use tracing::{info, warn};

use crate::errors::PatchError;

/// Merges diagnosed patches into a job's cumulative patch set
#[derive(Debug, Clone, Default)]
pub struct PatchEngine;

impl PatchEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns `current` extended with `patch`.
    ///
    /// A signature is accepted once per job; the input set is never modified.
    pub fn merge(&self, current: &PatchSet, patch: Patch) -> Result<PatchSet, PatchError> {
        let signature = patch.signature;
        let mut next = current.clone();
        if !next.insert(patch) {
            warn!(%signature, "rejecting repeated patch signature");
            return Err(PatchError::AlreadyTried(signature));
        }
        info!(%signature, total = next.len(), "patch accepted");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scry_core_types::{FailureKind, PatchAction, PatchSignature};

    #[test]
    fn test_merge_appends_in_order() {
        let engine = PatchEngine::new();
        let first = Patch::new(
            PatchSignature::new(FailureKind::NavigationError, Some(0)),
            PatchAction::WaitLoadState,
        );
        let second = Patch::new(
            PatchSignature::new(FailureKind::Timeout, Some(2)),
            PatchAction::ExtraWaitMs { delta_ms: 2_000 },
        );
        let set = engine.merge(&PatchSet::new(), first.clone()).unwrap();
        let set = engine.merge(&set, second.clone()).unwrap();
        assert_eq!(set.patches(), &[first, second]);
    }

    #[test]
    fn test_repeated_signature_rejected() {
        let engine = PatchEngine::new();
        let signature = PatchSignature::new(FailureKind::Timeout, Some(2));
        let set = engine
            .merge(
                &PatchSet::new(),
                Patch::new(signature, PatchAction::ExtraWaitMs { delta_ms: 2_000 }),
            )
            .unwrap();
        let err = engine
            .merge(
                &set,
                Patch::new(signature, PatchAction::ExtraWaitMs { delta_ms: 4_000 }),
            )
            .unwrap_err();
        assert_eq!(err, PatchError::AlreadyTried(signature));
        assert_eq!(set.len(), 1);
    }
}
