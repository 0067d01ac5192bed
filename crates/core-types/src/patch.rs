//! Repair patch vocabulary shared by the diagnoser, optimizer and code generator

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::PatchSignature;

/// One entry of the fixed repair catalog
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(tag = "action", rename_all = "snake_case"))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PatchAction {
    /// Wait for the network to go idle before the first step and after each navigation
    WaitLoadState,
    /// Total extra milliseconds added to every WaitFor timeout
    ExtraWaitMs { delta_ms: u64 },
    /// Dismiss a consent dialog before the first step and after the first navigation
    HandleCookieBanner,
    /// Target `candidate` instead of the current selector at `step_index`
    SelectorFallback { step_index: usize, candidate: String },
}

impl PatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            PatchAction::WaitLoadState => "wait_load_state",
            PatchAction::ExtraWaitMs { .. } => "extra_wait_ms",
            PatchAction::HandleCookieBanner => "handle_cookie_banner",
            PatchAction::SelectorFallback { .. } => "selector_fallback",
        }
    }
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchAction::ExtraWaitMs { delta_ms } => write!(f, "extra_wait_ms(+{delta_ms})"),
            PatchAction::SelectorFallback {
                step_index,
                candidate,
            } => write!(f, "selector_fallback(step {step_index} -> {candidate})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A catalog action together with the failure signature it addresses
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Patch {
    pub signature: PatchSignature,
    pub action: PatchAction,
}

impl Patch {
    pub fn new(signature: PatchSignature, action: PatchAction) -> Self {
        Self { signature, action }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}", self.action, self.signature)
    }
}

/// Ordered patch history of one job
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PatchSet {
    patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `patch` unless its signature was already applied.
    ///
    /// Returns `false` and leaves the set untouched on a repeated signature.
    pub fn insert(&mut self, patch: Patch) -> bool {
        if self.contains_signature(&patch.signature) {
            return false;
        }
        self.patches.push(patch);
        true
    }

    pub fn contains_signature(&self, signature: &PatchSignature) -> bool {
        self.patches.iter().any(|p| &p.signature == signature)
    }

    pub fn signatures(&self) -> BTreeSet<PatchSignature> {
        self.patches.iter().map(|p| p.signature).collect()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Folds the history in application order into the effective knobs.
    ///
    /// Patches touching the same knob override each other; the latest wins.
    pub fn knobs(&self) -> PatchKnobs {
        let mut knobs = PatchKnobs::default();
        for patch in &self.patches {
            match &patch.action {
                PatchAction::WaitLoadState => knobs.wait_load_state = true,
                PatchAction::ExtraWaitMs { delta_ms } => knobs.extra_wait_ms = *delta_ms,
                PatchAction::HandleCookieBanner => knobs.handle_cookie_banner = true,
                PatchAction::SelectorFallback {
                    step_index,
                    candidate,
                } => {
                    knobs
                        .selector_overrides
                        .insert(*step_index, candidate.clone());
                    knobs
                        .consumed_selectors
                        .entry(*step_index)
                        .or_default()
                        .insert(candidate.clone());
                }
            }
        }
        knobs
    }
}

/// Effective repair settings of a patch set
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PatchKnobs {
    pub wait_load_state: bool,
    pub extra_wait_ms: u64,
    pub handle_cookie_banner: bool,
    /// Step index to the selector that replaces the step's own
    pub selector_overrides: BTreeMap<usize, String>,
    /// Every fallback candidate ever applied, per step
    pub consumed_selectors: BTreeMap<usize, BTreeSet<String>>,
}

impl PatchKnobs {
    pub fn selector_for(&self, step_index: usize) -> Option<&str> {
        self.selector_overrides.get(&step_index).map(String::as_str)
    }

    pub fn is_consumed(&self, step_index: usize, selector: &str) -> bool {
        self.consumed_selectors
            .get(&step_index)
            .is_some_and(|used| used.contains(selector))
    }
}
