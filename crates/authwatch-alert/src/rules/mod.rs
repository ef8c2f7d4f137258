//! Built-in metric aggregators and the per-metric lookup table.

pub mod count;
pub mod counter;
pub mod max_per_user;

use crate::error::{AlertError, Result};
use crate::MetricAggregator;
use authwatch_common::types::MetricSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use count::CountInWindow;
pub use counter::RawCounter;
pub use max_per_user::MaxPerUserInWindow;

/// Start of the trailing window ending at `now`. A window reaching past the
/// earliest representable instant covers every event.
pub(crate) fn window_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Maps metric ids to their aggregator.
///
/// Metric ids with no entry are read as a raw counter of the same name.
#[derive(Default, Clone)]
pub struct AggregatorTable {
    entries: HashMap<String, Arc<dyn MetricAggregator>>,
}

impl AggregatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric_id: impl Into<String>, aggregator: Arc<dyn MetricAggregator>) {
        self.entries.insert(metric_id.into(), aggregator);
    }

    pub fn with(
        mut self,
        metric_id: impl Into<String>,
        aggregator: impl MetricAggregator + 'static,
    ) -> Self {
        self.insert(metric_id, Arc::new(aggregator));
        self
    }

    /// Kind name that will be used for `metric_id`.
    pub fn kind_for(&self, metric_id: &str) -> &str {
        self.entries.get(metric_id).map_or("counter", |a| a.kind())
    }

    pub fn compute(
        &self,
        metric_id: &str,
        snapshot: &MetricSnapshot,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        match self.entries.get(metric_id) {
            Some(aggregator) => aggregator.compute(snapshot, window, now),
            None => RawCounter::read(snapshot, metric_id),
        }
    }
}

/// Declarative aggregator definition, as found in config files.
///
/// `kind` is one of `"count"`, `"max_per_user"` or `"counter"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub metric_id: String,
    pub kind: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub counter: Option<String>,
}

impl AggregationSpec {
    pub fn build(&self) -> Result<Arc<dyn MetricAggregator>> {
        let event_type = || {
            self.event_type
                .clone()
                .ok_or_else(|| AlertError::MissingAggregationField {
                    metric_id: self.metric_id.clone(),
                    field: "event_type",
                })
        };
        let aggregator: Arc<dyn MetricAggregator> = match self.kind.as_str() {
            "count" | "count_in_window" => Arc::new(CountInWindow::new(event_type()?)),
            "max_per_user" | "max_per_user_in_window" => {
                Arc::new(MaxPerUserInWindow::new(event_type()?))
            }
            "counter" | "raw_counter" => Arc::new(RawCounter::new(
                self.counter.clone().unwrap_or_else(|| self.metric_id.clone()),
            )),
            other => return Err(AlertError::UnknownAggregation(other.to_string())),
        };
        Ok(aggregator)
    }
}

impl AggregatorTable {
    /// Adds or replaces entries from config specs.
    pub fn extend_from_specs(&mut self, specs: &[AggregationSpec]) -> Result<()> {
        for spec in specs {
            self.insert(spec.metric_id.clone(), spec.build()?);
        }
        Ok(())
    }
}
