//! JSON event lines a generated script prints on stdout

use scry_core_types::FailureKind;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    StepStarted {
        step: usize,
        #[serde(default)]
        kind: String,
    },
    StepOk {
        step: usize,
    },
    StepWarning {
        step: usize,
        kind: String,
        #[serde(default)]
        message: String,
    },
    StepFailed {
        step: usize,
        kind: String,
        #[serde(default)]
        message: String,
    },
    Result {
        #[serde(default)]
        data: Value,
    },
}

/// Fold of every event seen so far in one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    pub last_started: Option<usize>,
    pub completed: Vec<usize>,
    pub warnings: Vec<(usize, String)>,
    pub failed: Option<(usize, FailureKind, String)>,
    pub result: Option<Value>,
}

impl EventLog {
    /// Records one stdout line; anything that is not an event is ignored
    pub fn ingest(&mut self, line: &str) {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            if !trimmed.is_empty() {
                debug!(line = trimmed, "script output");
            }
            return;
        }
        let event = match serde_json::from_str::<ScriptEvent>(trimmed) {
            Ok(event) => event,
            Err(err) => {
                debug!(error = %err, line = trimmed, "unrecognized script event");
                return;
            }
        };
        match event {
            ScriptEvent::StepStarted { step, .. } => self.last_started = Some(step),
            ScriptEvent::StepOk { step } => self.completed.push(step),
            ScriptEvent::StepWarning {
                step,
                kind,
                message,
            } => {
                warn!(step, kind = %kind, message = %message, "non-critical step failed");
                self.warnings.push((step, message));
            }
            ScriptEvent::StepFailed {
                step,
                kind,
                message,
            } => {
                let kind = kind.parse().unwrap_or(FailureKind::UnhandledException);
                self.failed = Some((step, kind, message));
            }
            ScriptEvent::Result { data } => self.result = Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_event_stream() {
        let mut log = EventLog::default();
        for line in [
            r#"{"event": "step_started", "step": 0, "kind": "navigate"}"#,
            r#"{"event": "step_ok", "step": 0}"#,
            "Downloading chromium...",
            r#"{"event": "step_started", "step": 1, "kind": "hover"}"#,
            r#"{"event": "step_warning", "step": 1, "kind": "timeout", "message": "slow"}"#,
            r#"{"event": "step_started", "step": 2, "kind": "click"}"#,
            r#"{"event": "step_failed", "step": 2, "kind": "selector_not_found", "message": "no match"}"#,
        ] {
            log.ingest(line);
        }
        assert_eq!(log.last_started, Some(2));
        assert_eq!(log.completed, vec![0]);
        assert_eq!(log.warnings.len(), 1);
        assert_eq!(
            log.failed,
            Some((2, FailureKind::SelectorNotFound, "no match".to_string()))
        );
        assert!(log.result.is_none());
    }

    #[test]
    fn test_unknown_failure_kind_is_unhandled() {
        let mut log = EventLog::default();
        log.ingest(r#"{"event": "step_failed", "step": 4, "kind": "meteor"}"#);
        assert_eq!(
            log.failed,
            Some((4, FailureKind::UnhandledException, String::new()))
        );
    }

    #[test]
    fn test_result_payload_kept() {
        let mut log = EventLog::default();
        log.ingest(r#"{"event": "result", "data": {"price": 42}}"#);
        log.ingest(r#"{"event": "bogus"}"#);
        assert_eq!(log.result, Some(serde_json::json!({"price": 42})));
    }
}
