//! Raw action records → validated [`ScrapePlan`]

use tracing::debug;

use crate::errors::ValidationError;
use crate::exploration::{ExplorationResult, RawAction};
use crate::types::{
    ElementHint, FillValue, PlanStep, PlannedStep, ScrapePlan, ValidationType, WaitState,
    DEFAULT_WAIT_TIMEOUT_MS,
};

/// Build a plan from an exploration result.
///
/// Fails on the first malformed action; nothing is executed before this
/// returns. When the exploration names a start URL but recorded no
/// navigation, a leading Navigate is inserted.
pub fn build_plan(exploration: &ExplorationResult) -> Result<ScrapePlan, ValidationError> {
    if exploration.actions.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }

    let mut steps = exploration
        .actions
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_action(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(start_url) = exploration.start_url.as_deref() {
        let has_navigation = steps
            .iter()
            .any(|planned| matches!(planned.step, PlanStep::Navigate { .. }));
        if !has_navigation {
            if !is_supported_url(start_url) {
                return Err(ValidationError::InvalidUrl {
                    index: 0,
                    url: start_url.to_string(),
                });
            }
            debug!(url = start_url, "prepending navigation to start url");
            steps.insert(
                0,
                PlannedStep::new(PlanStep::Navigate {
                    url: start_url.to_string(),
                }),
            );
        }
    }

    let notes = exploration
        .notes
        .clone()
        .unwrap_or_else(|| format!("explored: {} actions", exploration.actions.len()));

    Ok(ScrapePlan::new(steps)?
        .with_notes(notes)
        .with_extraction(exploration.extraction.clone()))
}

fn parse_action(index: usize, raw: &RawAction) -> Result<PlannedStep, ValidationError> {
    let kind = raw.kind.trim().to_ascii_lowercase();
    let step = match kind.as_str() {
        "navigate" | "goto" => {
            let url = required(index, "navigate", "url", raw.url.as_deref())?;
            if !is_supported_url(url) {
                return Err(ValidationError::InvalidUrl {
                    index,
                    url: url.to_string(),
                });
            }
            PlanStep::Navigate {
                url: url.to_string(),
            }
        }
        "click" => PlanStep::Click {
            selector: selector(index, "click", raw)?,
            frame: non_blank(raw.frame.as_deref()),
        },
        "fill" | "type" => {
            let selector = selector(index, "fill", raw)?;
            let value = match non_blank(raw.secret.as_deref()) {
                Some(name) => FillValue::Secret(name),
                None => FillValue::Literal(
                    raw.text
                        .clone()
                        .or_else(|| raw.value.clone())
                        .unwrap_or_default(),
                ),
            };
            PlanStep::Fill { selector, value }
        }
        "select" => PlanStep::Select {
            selector: selector(index, "select", raw)?,
            value: required(index, "select", "value", raw.value.as_deref())?.to_string(),
        },
        "hover" => PlanStep::Hover {
            selector: selector(index, "hover", raw)?,
        },
        "keypress" | "key_press" | "press" => PlanStep::KeyPress {
            key: required(index, "key_press", "key", raw.key.as_deref())?.to_string(),
            selector: non_blank(raw.selector.as_deref()),
        },
        "upload" => PlanStep::Upload {
            selector: selector(index, "upload", raw)?,
            file_path: required(index, "upload", "file_path", raw.file_path.as_deref())?
                .to_string(),
        },
        "wait_for" | "waitfor" | "wait" => {
            let state = match raw.state.as_deref() {
                None => WaitState::default(),
                Some(value) => value.parse().map_err(|value| ValidationError::InvalidValue {
                    index,
                    field: "state",
                    value,
                })?,
            };
            PlanStep::WaitFor {
                selector: selector(index, "wait_for", raw)?,
                state,
                timeout_ms: raw.timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS),
            }
        }
        "validate" => {
            let validation = match raw.validation_type.as_deref() {
                None => ValidationType::default(),
                Some(value) => {
                    value
                        .parse()
                        .map_err(|value| ValidationError::InvalidValue {
                            index,
                            field: "validation_type",
                            value,
                        })?
                }
            };
            PlanStep::Validate {
                selector: selector(index, "validate", raw)?,
                validation,
                is_critical: raw.is_critical.unwrap_or(false),
                expected_text: raw.expected_text.clone(),
                expected_count: raw.expected_count,
                description: raw.description.clone().unwrap_or_default(),
            }
        }
        _ => {
            return Err(ValidationError::UnknownAction {
                index,
                kind: raw.kind.clone(),
            })
        }
    };

    let element = ElementHint {
        html: non_blank(raw.metadata.element_html.as_deref()),
        dom_path: non_blank(raw.metadata.dom_path.as_deref()),
    };
    Ok(PlannedStep::new(step).with_element(element))
}

fn selector(index: usize, kind: &'static str, raw: &RawAction) -> Result<String, ValidationError> {
    required(index, kind, "selector", raw.selector.as_deref()).map(str::to_string)
}

fn required<'a>(
    index: usize,
    kind: &'static str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField { index, kind, field }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_supported_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:text/html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_ordered_plan() {
        let exploration = ExplorationResult::new(vec![
            RawAction::navigate("https://example.com"),
            RawAction::fill("#q", "rust"),
            RawAction::click("button[type=submit]")
                .with_element_html("<button id=\"go\">Go</button>"),
        ]);
        let plan = build_plan(&exploration).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(matches!(plan.steps()[0].step, PlanStep::Navigate { .. }));
        assert_eq!(plan.steps()[2].step.selector(), Some("button[type=submit]"));
        assert!(plan.steps()[2].element.is_some());
        assert!(plan.steps()[1].element.is_none());
    }

    #[test]
    fn test_empty_exploration_rejected() {
        let exploration = ExplorationResult::new(Vec::new());
        assert_eq!(build_plan(&exploration), Err(ValidationError::EmptyPlan));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let exploration = ExplorationResult::new(vec![
            RawAction::navigate("https://example.com"),
            RawAction::new("teleport"),
        ]);
        assert_eq!(
            build_plan(&exploration),
            Err(ValidationError::UnknownAction {
                index: 1,
                kind: "teleport".into()
            })
        );
    }

    #[test]
    fn test_blank_selector_rejected() {
        let exploration = ExplorationResult::new(vec![RawAction::click("   ")]);
        assert_eq!(
            build_plan(&exploration),
            Err(ValidationError::MissingField {
                index: 0,
                kind: "click",
                field: "selector"
            })
        );
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let exploration = ExplorationResult::new(vec![RawAction::navigate("file:///etc/passwd")]);
        assert!(matches!(
            build_plan(&exploration),
            Err(ValidationError::InvalidUrl { index: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_wait_state_rejected() {
        let mut wait = RawAction::wait_for(".results");
        wait.state = Some("glowing".into());
        let err = build_plan(&ExplorationResult::new(vec![wait])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidValue {
                index: 0,
                field: "state",
                value: "glowing".into()
            }
        );
    }

    #[test]
    fn test_start_url_prepended_without_navigation() {
        let mut exploration = ExplorationResult::new(vec![RawAction::click("#accept")]);
        exploration.start_url = Some("https://example.com/start".into());
        let plan = build_plan(&exploration).unwrap();
        assert_eq!(
            plan.steps()[0].step,
            PlanStep::Navigate {
                url: "https://example.com/start".into()
            }
        );
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_secret_fill_keeps_name_only() {
        let mut fill = RawAction::fill("#password", "");
        fill.secret = Some("password".into());
        let plan = build_plan(&ExplorationResult::new(vec![fill])).unwrap();
        assert_eq!(
            plan.steps()[0].step,
            PlanStep::Fill {
                selector: "#password".into(),
                value: FillValue::Secret("password".into())
            }
        );
    }

    #[test]
    fn test_parses_json_aliases() {
        let raw = r##"{
            "steps": [
                {"type": "goto", "url": "https://example.com"},
                {"type": "press", "key": "Enter"},
                {"action": "wait", "selector": "#list", "state": "attached", "timeout_ms": 2500}
            ]
        }"##;
        let plan = build_plan(&ExplorationResult::from_json(raw).unwrap()).unwrap();
        assert_eq!(
            plan.steps()[2].step,
            PlanStep::WaitFor {
                selector: "#list".into(),
                state: WaitState::Attached,
                timeout_ms: 2500
            }
        );
    }
}
