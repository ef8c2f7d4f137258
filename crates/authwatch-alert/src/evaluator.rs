use crate::error::{AlertError, Result};
use crate::registry::ThresholdRegistry;
use crate::rules::AggregatorTable;
use authwatch_common::types::{AlertRecord, MetricSnapshot, ThresholdRule};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Engine-wide cooldown applied after every firing, unless configured.
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Result of evaluating one rule for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Cooldown active; the state was left untouched.
    CoolingDown,
    /// Value computed, at or below threshold.
    Quiet { value: f64 },
    /// Value above threshold; cooldown now active.
    Fired(AlertRecord),
}

/// Everything one tick produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub fired: Vec<AlertRecord>,
    /// Rules whose value was computed this tick (fired or quiet).
    pub evaluated: usize,
    /// Metric ids skipped because of an active cooldown.
    pub suppressed: Vec<String>,
    /// Metric ids whose rule was removed while the tick was running.
    pub vanished: Vec<String>,
    pub errors: Vec<AlertError>,
}

/// Applies window, cooldown and threshold rules to every registered metric.
pub struct ThresholdEvaluator {
    registry: Arc<ThresholdRegistry>,
    aggregators: AggregatorTable,
    cooldown: Duration,
}

impl ThresholdEvaluator {
    pub fn new(
        registry: Arc<ThresholdRegistry>,
        aggregators: AggregatorTable,
        cooldown_secs: u64,
    ) -> Self {
        let cooldown = i64::try_from(cooldown_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::seconds(DEFAULT_COOLDOWN_SECS as i64));
        Self {
            registry,
            aggregators,
            cooldown,
        }
    }

    pub fn registry(&self) -> &Arc<ThresholdRegistry> {
        &self.registry
    }

    /// Evaluates every registered rule against one shared snapshot.
    ///
    /// A failing rule is recorded in [`TickOutcome::errors`] and does not
    /// stop the rest of the tick.
    pub fn evaluate(&self, snapshot: &MetricSnapshot, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for metric_id in self.registry.metric_ids() {
            let verdict = self
                .registry
                .with_rule(&metric_id, |rule| self.evaluate_rule(rule, snapshot, now));

            match verdict {
                None => {
                    tracing::debug!(metric_id = %metric_id, "Rule removed during tick, skipping");
                    outcome.vanished.push(metric_id);
                }
                Some(Ok(Verdict::CoolingDown)) => {
                    tracing::debug!(metric_id = %metric_id, "Alert suppressed (cooldown active)");
                    outcome.suppressed.push(metric_id);
                }
                Some(Ok(Verdict::Quiet { value })) => {
                    tracing::trace!(metric_id = %metric_id, value, "Metric within threshold");
                    outcome.evaluated += 1;
                }
                Some(Ok(Verdict::Fired(record))) => {
                    tracing::warn!(
                        metric_id = %metric_id,
                        severity = %record.severity,
                        value = record.value,
                        threshold = record.threshold,
                        "Threshold exceeded"
                    );
                    outcome.evaluated += 1;
                    outcome.fired.push(record);
                }
                Some(Err(e)) => {
                    tracing::warn!(metric_id = %metric_id, error = %e, "Metric evaluation failed");
                    outcome.errors.push(e);
                }
            }
        }

        outcome
    }

    /// Runs the per-metric state machine for a single rule.
    pub(crate) fn evaluate_rule(
        &self,
        rule: &ThresholdRule,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        self.registry.states().update(&rule.metric_id, now, |state| {
            if state.is_cooling_down(now) {
                return Ok(Verdict::CoolingDown);
            }
            state.clear_expired_cooldown(now);

            let window = rule
                .window()
                .filter(|w| now.checked_sub_signed(*w).is_some())
                .ok_or_else(|| AlertError::WindowOutOfRange {
                    metric_id: rule.metric_id.clone(),
                    window_secs: rule.window_secs,
                })?;

            if state.reset_window_if_elapsed(now, window) {
                tracing::trace!(metric_id = %rule.metric_id, "Window reset");
            }

            let value = self.aggregators.compute(&rule.metric_id, snapshot, window, now)?;
            if !value.is_finite() {
                return Err(AlertError::NonFiniteValue {
                    metric_id: rule.metric_id.clone(),
                    value,
                });
            }
            state.count = value;

            if value > rule.threshold {
                state.mark_fired(now, self.cooldown);
                Ok(Verdict::Fired(AlertRecord::from_rule(rule, value, now)))
            } else {
                Ok(Verdict::Quiet { value })
            }
        })
    }
}
