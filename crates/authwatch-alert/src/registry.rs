use crate::error::{AlertError, Result};
use crate::state::AlertStateStore;
use authwatch_common::types::ThresholdRule;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Threshold rules keyed by metric id, plus the state store they pair with.
///
/// The registry can be mutated while a tick is running. Removing a rule
/// deletes its alert state under the same write lock, so the evaluator
/// never sees one without the other.
pub struct ThresholdRegistry {
    rules: RwLock<BTreeMap<String, ThresholdRule>>,
    states: Arc<AlertStateStore>,
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdRegistry {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            states: Arc::new(AlertStateStore::new()),
        }
    }

    /// Builds a registry pre-populated with `rules`.
    pub fn with_rules(rules: impl IntoIterator<Item = ThresholdRule>) -> Result<Self> {
        let registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    /// Inserts or replaces the rule for `rule.metric_id`.
    ///
    /// Returns the replaced rule, if any. Replacing keeps the existing
    /// alert state, so an update does not clear an active cooldown.
    pub fn register(&self, rule: ThresholdRule) -> Result<Option<ThresholdRule>> {
        if rule.metric_id.trim().is_empty() {
            return Err(AlertError::EmptyMetricId);
        }
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let metric_id = rule.metric_id.clone();
        let previous = rules.insert(metric_id.clone(), rule);
        tracing::info!(
            metric_id = %metric_id,
            replaced = previous.is_some(),
            "Threshold rule registered"
        );
        Ok(previous)
    }

    /// Removes the rule and its alert state. Returns the removed rule.
    pub fn remove(&self, metric_id: &str) -> Option<ThresholdRule> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let removed = rules.remove(metric_id);
        // Purge while still holding the write lock.
        let had_state = self.states.remove(metric_id).is_some();
        if removed.is_some() {
            tracing::info!(metric_id, had_state, "Threshold rule removed");
        }
        removed
    }

    /// All rules, ordered by metric id.
    pub fn list(&self) -> Vec<ThresholdRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn metric_ids(&self) -> Vec<String> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn states(&self) -> &Arc<AlertStateStore> {
        &self.states
    }

    /// Runs `f` against the current rule for `metric_id` while holding the
    /// read lock, so a concurrent `remove` waits until `f` returns.
    /// Returns `None` if the rule no longer exists.
    pub(crate) fn with_rule<R>(
        &self,
        metric_id: &str,
        f: impl FnOnce(&ThresholdRule) -> R,
    ) -> Option<R> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.get(metric_id).map(f)
    }
}
