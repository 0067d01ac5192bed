//! Optional, non-authoritative page classification

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ClassifierError;

/// What a classifier believes the failure page shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentHint {
    pub consent_dialog: bool,
    pub confidence: f32,
    #[serde(default)]
    pub label: Option<String>,
}

/// Classifies captured failure markup.
///
/// Results only add evidence to the heuristic rules; callers bound the call
/// with a timeout and ignore errors.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, html: &str) -> Result<ContentHint, ClassifierError>;
}
