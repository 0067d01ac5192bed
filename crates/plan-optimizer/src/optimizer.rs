use plan_ir::{PlanStep, PlannedStep, ScrapePlan};
use scry_core_types::{PatchKnobs, PatchSet};
use tracing::debug;

use crate::errors::OptimizeError;
use crate::policy::OptimizerPolicy;
use crate::selectors::{fallback_candidates, normalize_selector};

/// Stateless plan normalizer
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    policy: OptimizerPolicy,
}

impl Optimizer {
    pub fn new(policy: OptimizerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OptimizerPolicy {
        &self.policy
    }

    /// Produce the optimized plan for `plan`.
    ///
    /// The same inputs always produce the same step indices, so patches
    /// keyed by step index stay valid across re-optimizations. Fallback
    /// candidates already consumed by `patches` are left out.
    pub fn optimize(
        &self,
        plan: &ScrapePlan,
        patches: Option<&PatchSet>,
    ) -> Result<ScrapePlan, OptimizeError> {
        let knobs = patches.map(PatchSet::knobs).unwrap_or_default();
        let original_len = plan.len();

        let steps: Vec<PlannedStep> = plan.steps().iter().map(normalize_step).collect();
        let steps = collapse_navigations(steps);
        let steps = merge_waits(steps);
        let steps = if self.policy.drop_idle_hover {
            drop_idle_hovers(steps)
        } else {
            steps
        };

        if steps.is_empty() {
            return Err(OptimizeError::NoActionableSteps);
        }

        let steps = attach_fallbacks(steps, &knobs);
        let optimized_len = steps.len();
        debug!(
            before = original_len,
            after = optimized_len,
            "plan optimized"
        );

        Ok(ScrapePlan::new(steps)?
            .with_notes(format!("optimized: {original_len} -> {optimized_len} steps"))
            .with_extraction(plan.extraction().cloned()))
    }
}

fn normalize_step(planned: &PlannedStep) -> PlannedStep {
    let mut out = planned.clone();
    if let Some(selector) = planned.step.selector() {
        let normalized = normalize_selector(selector);
        if normalized != selector {
            out.step = planned.step.with_selector(&normalized);
        }
    }
    out
}

fn collapse_navigations(steps: Vec<PlannedStep>) -> Vec<PlannedStep> {
    let mut out: Vec<PlannedStep> = Vec::with_capacity(steps.len());
    for planned in steps {
        if let (
            PlanStep::Navigate { url },
            Some(PlannedStep {
                step: PlanStep::Navigate { url: previous },
                ..
            }),
        ) = (&planned.step, out.last())
        {
            if url == previous {
                debug!(url = %url, "dropping duplicate navigation");
                continue;
            }
        }
        out.push(planned);
    }
    out
}

fn merge_waits(steps: Vec<PlannedStep>) -> Vec<PlannedStep> {
    let mut out: Vec<PlannedStep> = Vec::with_capacity(steps.len());
    for planned in steps {
        if let PlanStep::WaitFor {
            selector,
            state,
            timeout_ms,
        } = &planned.step
        {
            if let Some(PlannedStep {
                step:
                    PlanStep::WaitFor {
                        selector: prev_selector,
                        state: prev_state,
                        timeout_ms: prev_timeout,
                    },
                ..
            }) = out.last_mut()
            {
                if prev_selector == selector {
                    if state.strictness() > prev_state.strictness() {
                        *prev_state = *state;
                    }
                    *prev_timeout = (*prev_timeout).max(*timeout_ms);
                    debug!(selector = %selector, "merged adjacent waits");
                    continue;
                }
            }
        }
        out.push(planned);
    }
    out
}

fn drop_idle_hovers(steps: Vec<PlannedStep>) -> Vec<PlannedStep> {
    let keep: Vec<bool> = steps
        .iter()
        .enumerate()
        .map(|(index, planned)| match planned.step {
            PlanStep::Hover { .. } => steps
                .get(index + 1)
                .is_some_and(|next| next.step.is_interactive()),
            _ => true,
        })
        .collect();
    steps
        .into_iter()
        .zip(keep)
        .filter_map(|(planned, keep)| {
            if !keep {
                debug!(step = ?planned.step, "dropping idle hover");
            }
            keep.then_some(planned)
        })
        .collect()
}

fn attach_fallbacks(steps: Vec<PlannedStep>, knobs: &PatchKnobs) -> Vec<PlannedStep> {
    steps
        .into_iter()
        .enumerate()
        .map(|(index, planned)| {
            if !planned.step.is_interactive() {
                return planned.with_fallbacks(Vec::new());
            }
            let Some(primary) = planned.step.selector() else {
                return planned;
            };
            let fallbacks: Vec<String> =
                fallback_candidates(primary, planned.element.as_ref())
                    .into_iter()
                    .filter(|candidate| !knobs.is_consumed(index, candidate))
                    .collect();
            planned.with_fallbacks(fallbacks)
        })
        .collect()
}
