//! Raw exploration records handed over by the navigation process

use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionSpec;

/// Evidence captured while the explorer performed one action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// One untyped action as recorded by the explorer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(alias = "type", alias = "action")]
    pub kind: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Name of a secret to type instead of literal text
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub validation_type: Option<String>,
    #[serde(default)]
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub expected_text: Option<String>,
    #[serde(default)]
    pub expected_count: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

impl RawAction {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new("navigate")
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::new("click")
        }
    }

    pub fn fill(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            text: Some(text.into()),
            ..Self::new("fill")
        }
    }

    pub fn wait_for(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::new("wait_for")
        }
    }

    pub fn with_element_html(mut self, html: impl Into<String>) -> Self {
        self.metadata.element_html = Some(html.into());
        self
    }
}

/// Output of an exploration run: the validated input boundary of the core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationResult {
    #[serde(alias = "steps")]
    pub actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ExplorationResult {
    pub fn new(actions: Vec<RawAction>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
