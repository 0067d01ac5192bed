use serde::{Deserialize, Serialize};

/// Optional optimizer transforms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerPolicy {
    /// Drop a Hover whose next step does not interact with the page
    pub drop_idle_hover: bool,
}
