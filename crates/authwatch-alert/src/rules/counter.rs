use crate::error::{AlertError, Result};
use crate::MetricAggregator;
use authwatch_common::types::MetricSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Reads a named counter straight from the snapshot, ignoring the window.
/// A missing counter reads as zero.
pub struct RawCounter {
    pub counter: String,
}

impl RawCounter {
    pub fn new(counter: impl Into<String>) -> Self {
        Self {
            counter: counter.into(),
        }
    }

    pub(crate) fn read(snapshot: &MetricSnapshot, counter: &str) -> Result<f64> {
        match snapshot.counter(counter) {
            None => Ok(0.0),
            Some(value) if value.is_finite() => Ok(value),
            Some(value) => Err(AlertError::NonFiniteValue {
                metric_id: counter.to_string(),
                value,
            }),
        }
    }
}

impl MetricAggregator for RawCounter {
    fn kind(&self) -> &str {
        "counter"
    }

    fn compute(
        &self,
        snapshot: &MetricSnapshot,
        _window: Duration,
        _now: DateTime<Utc>,
    ) -> Result<f64> {
        Self::read(snapshot, &self.counter)
    }
}
