use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program the script path and output directory are passed to
    pub interpreter: String,
    /// Wall-clock budget for a whole script run
    pub overall_timeout_ms: u64,
    /// Default timeout of each automation call inside the script
    pub step_timeout_ms: u64,
    pub headless: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            overall_timeout_ms: 300_000,
            step_timeout_ms: 30_000,
            headless: true,
        }
    }
}

impl ExecutorConfig {
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}
