use serde::{Deserialize, Serialize};

/// Diagnosis tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnoserPolicy {
    /// Added to the current extra wait each time a WaitFor times out
    pub extra_wait_step_ms: u64,
    /// Budget for the optional content classifier call
    pub classifier_timeout_ms: u64,
    /// Minimum classifier confidence for a consent-dialog hint to count
    pub consent_confidence: f32,
}

impl Default for DiagnoserPolicy {
    fn default() -> Self {
        Self {
            extra_wait_step_ms: 2_000,
            classifier_timeout_ms: 5_000,
            consent_confidence: 0.7,
        }
    }
}
