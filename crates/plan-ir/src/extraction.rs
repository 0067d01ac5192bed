//! Data extraction spec carried alongside a plan

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How to read one output field from the final page.
///
/// A spec with nested `fields` extracts a list: `selector` picks the parent
/// elements and every nested field is read relative to each parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl FieldSpec {
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: None,
            regex: None,
            fields: None,
            limit: None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.fields.is_some()
    }
}

/// Output field name to extraction rule; ordered so scripts are stable
pub type ExtractionSpec = BTreeMap<String, FieldSpec>;
