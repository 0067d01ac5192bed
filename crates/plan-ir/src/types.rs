//! Core plan types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::extraction::ExtractionSpec;

/// Timeout applied to a WaitFor step when the exploration recorded none
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Element state a WaitFor step waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }

    /// Rank used when two waits on the same selector are merged
    pub fn strictness(&self) -> u8 {
        match self {
            WaitState::Visible => 3,
            WaitState::Hidden => 2,
            WaitState::Attached => 1,
            WaitState::Detached => 0,
        }
    }
}

impl FromStr for WaitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Ok(WaitState::Visible),
            "hidden" => Ok(WaitState::Hidden),
            "attached" => Ok(WaitState::Attached),
            "detached" => Ok(WaitState::Detached),
            other => Err(other.to_string()),
        }
    }
}

/// What a Validate checkpoint asserts about its selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    #[default]
    Presence,
    Absence,
    Text,
    Count,
}

impl ValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::Presence => "presence",
            ValidationType::Absence => "absence",
            ValidationType::Text => "text",
            ValidationType::Count => "count",
        }
    }
}

impl FromStr for ValidationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "presence" => Ok(ValidationType::Presence),
            "absence" => Ok(ValidationType::Absence),
            "text" => Ok(ValidationType::Text),
            "count" => Ok(ValidationType::Count),
            other => Err(other.to_string()),
        }
    }
}

/// Text typed by a Fill step.
///
/// Secrets are referenced by name only; the value is injected into the
/// script's environment at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillValue {
    Literal(String),
    Secret(String),
}

impl FillValue {
    /// Environment variable the generated script reads a secret from
    pub fn env_var(name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("SCRY_SECRET_{normalized}")
    }
}

/// Discriminant of [`PlanStep`], used for logging and script comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Navigate,
    Click,
    Fill,
    Select,
    Hover,
    KeyPress,
    Upload,
    WaitFor,
    Validate,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Navigate => "navigate",
            StepKind::Click => "click",
            StepKind::Fill => "fill",
            StepKind::Select => "select",
            StepKind::Hover => "hover",
            StepKind::KeyPress => "key_press",
            StepKind::Upload => "upload",
            StepKind::WaitFor => "wait_for",
            StepKind::Validate => "validate",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One browser action in a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame: Option<String>,
    },
    Fill {
        selector: String,
        value: FillValue,
    },
    Select {
        selector: String,
        value: String,
    },
    Hover {
        selector: String,
    },
    KeyPress {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Upload {
        selector: String,
        file_path: String,
    },
    WaitFor {
        selector: String,
        #[serde(default)]
        state: WaitState,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },
    Validate {
        selector: String,
        #[serde(default)]
        validation: ValidationType,
        #[serde(default)]
        is_critical: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_count: Option<u32>,
        #[serde(default)]
        description: String,
    },
}

fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

impl PlanStep {
    pub fn kind(&self) -> StepKind {
        match self {
            PlanStep::Navigate { .. } => StepKind::Navigate,
            PlanStep::Click { .. } => StepKind::Click,
            PlanStep::Fill { .. } => StepKind::Fill,
            PlanStep::Select { .. } => StepKind::Select,
            PlanStep::Hover { .. } => StepKind::Hover,
            PlanStep::KeyPress { .. } => StepKind::KeyPress,
            PlanStep::Upload { .. } => StepKind::Upload,
            PlanStep::WaitFor { .. } => StepKind::WaitFor,
            PlanStep::Validate { .. } => StepKind::Validate,
        }
    }

    /// Element selector the step targets, if any
    pub fn selector(&self) -> Option<&str> {
        match self {
            PlanStep::Navigate { .. } => None,
            PlanStep::KeyPress { selector, .. } => selector.as_deref(),
            PlanStep::Click { selector, .. }
            | PlanStep::Fill { selector, .. }
            | PlanStep::Select { selector, .. }
            | PlanStep::Hover { selector }
            | PlanStep::Upload { selector, .. }
            | PlanStep::WaitFor { selector, .. }
            | PlanStep::Validate { selector, .. } => Some(selector),
        }
    }

    /// Returns a copy of the step targeting `selector` instead.
    ///
    /// Steps without an element target are returned unchanged.
    pub fn with_selector(&self, selector: &str) -> PlanStep {
        let mut step = self.clone();
        match &mut step {
            PlanStep::Navigate { .. } => {}
            PlanStep::KeyPress { selector: slot, .. } => {
                if slot.is_some() {
                    *slot = Some(selector.to_string());
                }
            }
            PlanStep::Click { selector: slot, .. }
            | PlanStep::Fill { selector: slot, .. }
            | PlanStep::Select { selector: slot, .. }
            | PlanStep::Hover { selector: slot }
            | PlanStep::Upload { selector: slot, .. }
            | PlanStep::WaitFor { selector: slot, .. }
            | PlanStep::Validate { selector: slot, .. } => *slot = selector.to_string(),
        }
        step
    }

    /// Steps that act on a page element and therefore get fallback selectors
    pub fn is_interactive(&self) -> bool {
        match self {
            PlanStep::Click { .. }
            | PlanStep::Fill { .. }
            | PlanStep::Select { .. }
            | PlanStep::Hover { .. }
            | PlanStep::Upload { .. } => true,
            PlanStep::KeyPress { selector, .. } => selector.is_some(),
            PlanStep::Navigate { .. } | PlanStep::WaitFor { .. } | PlanStep::Validate { .. } => {
                false
            }
        }
    }

    /// Whether a failure of this step aborts the script.
    ///
    /// Hovers are best-effort and non-critical validations only warn.
    pub fn is_critical(&self) -> bool {
        match self {
            PlanStep::Hover { .. } => false,
            PlanStep::Validate { is_critical, .. } => *is_critical,
            PlanStep::Navigate { .. }
            | PlanStep::Click { .. }
            | PlanStep::Fill { .. }
            | PlanStep::Select { .. }
            | PlanStep::KeyPress { .. }
            | PlanStep::Upload { .. }
            | PlanStep::WaitFor { .. } => true,
        }
    }
}

/// Element evidence captured during exploration for one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHint {
    /// Outer markup of the target element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Structural CSS path from the document root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_path: Option<String>,
}

impl ElementHint {
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.dom_path.is_none()
    }
}

/// A step together with its optimizer annotations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step: PlanStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementHint>,
    /// Alternative selectors, most reliable first; never contains the primary
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,
}

impl PlannedStep {
    pub fn new(step: PlanStep) -> Self {
        Self {
            step,
            element: None,
            fallbacks: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: ElementHint) -> Self {
        if !element.is_empty() {
            self.element = Some(element);
        }
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallbacks = fallbacks;
        self
    }
}

impl From<PlanStep> for PlannedStep {
    fn from(step: PlanStep) -> Self {
        PlannedStep::new(step)
    }
}

/// Ordered browser automation task.
///
/// Plans are immutable values: every transform builds a new plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapePlan {
    steps: Vec<PlannedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extraction: Option<ExtractionSpec>,
}

impl ScrapePlan {
    /// Build a plan, rejecting empty step lists and blank selectors
    pub fn new(steps: Vec<PlannedStep>) -> Result<Self, ValidationError> {
        if steps.is_empty() {
            return Err(ValidationError::EmptyPlan);
        }
        for (index, planned) in steps.iter().enumerate() {
            if let Some(selector) = planned.step.selector() {
                if selector.trim().is_empty() {
                    return Err(ValidationError::MissingField {
                        index,
                        kind: planned.step.kind().as_str(),
                        field: "selector",
                    });
                }
            }
        }
        Ok(Self {
            steps,
            notes: None,
            extraction: None,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_extraction(mut self, extraction: Option<ExtractionSpec>) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&PlannedStep> {
        self.steps.get(index)
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn extraction(&self) -> Option<&ExtractionSpec> {
        self.extraction.as_ref()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
