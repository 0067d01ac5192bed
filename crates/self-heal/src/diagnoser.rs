//! Heuristic failure diagnosis

use once_cell::sync::Lazy;
use plan_ir::{PlanStep, ScrapePlan};
use regex::Regex;
use scry_core_types::{FailureKind, FailureReport, Patch, PatchAction, PatchSet};
use tracing::debug;

use crate::classifier::ContentHint;
use crate::policy::DiagnoserPolicy;

static CONSENT_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(onetrust|cookiebot|didomi|qc-cmp|__cmp|gdpr|cookie[-_ ]?(banner|consent|notice|dialog)|consent[-_ ]?(banner|dialog|modal|manager)|accept all cookies)",
    )
    .expect("consent markup regex")
});

/// Everything known about one failed attempt
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisInput<'a> {
    pub failure: &'a FailureReport,
    /// The optimized plan that was executed
    pub plan: &'a ScrapePlan,
    pub patches: &'a PatchSet,
    pub page_html: Option<&'a str>,
    pub hint: Option<&'a ContentHint>,
}

/// Outcome of diagnosing one failure
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    Patch { patch: Patch, summary: String },
    NoPatchAvailable { summary: String },
}

impl Diagnosis {
    pub fn summary(&self) -> &str {
        match self {
            Diagnosis::Patch { summary, .. } | Diagnosis::NoPatchAvailable { summary } => summary,
        }
    }

    pub fn patch(&self) -> Option<&Patch> {
        match self {
            Diagnosis::Patch { patch, .. } => Some(patch),
            Diagnosis::NoPatchAvailable { .. } => None,
        }
    }

    fn none(summary: impl Into<String>) -> Self {
        Diagnosis::NoPatchAvailable {
            summary: summary.into(),
        }
    }
}

/// Maps a failure to at most one catalog patch
pub trait Diagnoser: Send + Sync {
    fn diagnose(&self, input: &DiagnosisInput<'_>) -> Diagnosis;
}

/// Fixed rule catalog; the first matching rule wins
#[derive(Debug, Clone, Default)]
pub struct HeuristicDiagnoser {
    policy: DiagnoserPolicy,
}

impl HeuristicDiagnoser {
    pub fn new(policy: DiagnoserPolicy) -> Self {
        Self { policy }
    }

    fn consent_detected(&self, input: &DiagnosisInput<'_>) -> bool {
        let from_markup = input
            .page_html
            .is_some_and(|html| CONSENT_MARKUP.is_match(html));
        let from_hint = input
            .hint
            .is_some_and(|hint| {
                hint.consent_dialog && hint.confidence >= self.policy.consent_confidence
            });
        from_markup || from_hint
    }
}

impl Diagnoser for HeuristicDiagnoser {
    fn diagnose(&self, input: &DiagnosisInput<'_>) -> Diagnosis {
        let failure = input.failure;
        let signature = failure.signature();
        if input.patches.contains_signature(&signature) {
            return Diagnosis::none(format!("{signature} persists after its patch"));
        }

        let knobs = input.patches.knobs();
        let step = failure
            .step_index
            .and_then(|index| input.plan.step(index));
        let patch = |action: PatchAction, summary: String| Diagnosis::Patch {
            patch: Patch::new(signature, action),
            summary,
        };

        if !knobs.handle_cookie_banner && self.consent_detected(input) {
            return patch(
                PatchAction::HandleCookieBanner,
                format!("consent dialog likely blocked {signature}"),
            );
        }

        let at_wait = matches!(step.map(|s| &s.step), Some(PlanStep::WaitFor { .. }));

        if failure.kind == FailureKind::Timeout && at_wait {
            let delta_ms = knobs
                .extra_wait_ms
                .saturating_add(self.policy.extra_wait_step_ms);
            return patch(
                PatchAction::ExtraWaitMs { delta_ms },
                format!("wait timed out at {signature}; extending waits by {delta_ms}ms"),
            );
        }

        if failure.kind == FailureKind::SelectorNotFound {
            if let (Some(index), Some(planned)) = (failure.step_index, step) {
                let current = knobs.selector_for(index);
                let next = planned
                    .fallbacks
                    .iter()
                    .find(|candidate| {
                        Some(candidate.as_str()) != current && !knobs.is_consumed(index, candidate)
                    });
                if let Some(candidate) = next {
                    return patch(
                        PatchAction::SelectorFallback {
                            step_index: index,
                            candidate: candidate.clone(),
                        },
                        format!("selector missing at step {index}; trying {candidate}"),
                    );
                }
                debug!(step = index, "no fallback candidates left");
                return Diagnosis::none(format!(
                    "selector missing at step {index} and no fallback candidates remain"
                ));
            }
        }

        let load_related = failure.kind == FailureKind::NavigationError
            || (failure.kind == FailureKind::Timeout && !at_wait);
        if load_related && !knobs.wait_load_state {
            return patch(
                PatchAction::WaitLoadState,
                format!("{signature} looks like an unsettled page; waiting for network idle"),
            );
        }

        Diagnosis::none(format!("no heuristic matches {signature}"))
    }
}
