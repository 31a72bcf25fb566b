//! Conditional model overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named predicate supplied at render time (e.g. damage fraction,
/// handedness) and referenced by override thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKey {
    Angle,
    Blocking,
    Broken,
    Brushing,
    Cast,
    Charged,
    Cooldown,
    CustomModelData,
    Damage,
    Damaged,
    Filled,
    Firework,
    HoneyLevel,
    Lefthanded,
    Level,
    Pull,
    Pulling,
    Throwing,
    Time,
    Tooting,
    TrimType,
}

/// A conditional model substitution: when every predicate threshold is met,
/// resolution redirects to the target model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOverride {
    /// Predicate thresholds, all of which must be satisfied.
    #[serde(default)]
    pub predicate: BTreeMap<PredicateKey, f64>,
    /// Target model resource location.
    pub model: String,
}

impl ModelOverride {
    /// Whether the supplied predicate values satisfy every threshold.
    ///
    /// A threshold with no supplied value never matches, so resolving with
    /// an empty predicate map skips all overrides.
    pub fn matches(&self, provided: &BTreeMap<PredicateKey, f64>) -> bool {
        self.predicate.iter().all(|(key, threshold)| {
            provided
                .get(key)
                .is_some_and(|value| value >= threshold)
        })
    }
}
