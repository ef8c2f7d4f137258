use crate::error::Result;
use crate::MetricAggregator;
use authwatch_common::types::MetricSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Number of events of one type inside the trailing window.
pub struct CountInWindow {
    pub event_type: String,
}

impl CountInWindow {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }
}

impl MetricAggregator for CountInWindow {
    fn kind(&self) -> &str {
        "count"
    }

    fn compute(
        &self,
        snapshot: &MetricSnapshot,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        let cutoff = super::window_cutoff(now, window);
        let count = snapshot.events_since(&self.event_type, cutoff).count();
        Ok(count as f64)
    }
}
