use crate::error::Result;
use crate::MetricAggregator;
use authwatch_common::types::MetricSnapshot;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Bucket for events that carry no user id.
pub const UNKNOWN_USER: &str = "unknown";

/// Largest per-user event count inside the trailing window.
///
/// This is a max over the user partition, not a sum: three failures for
/// one account and five for another yield 5.
pub struct MaxPerUserInWindow {
    pub event_type: String,
}

impl MaxPerUserInWindow {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }
}

impl MetricAggregator for MaxPerUserInWindow {
    fn kind(&self) -> &str {
        "max_per_user"
    }

    fn compute(
        &self,
        snapshot: &MetricSnapshot,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        let cutoff = super::window_cutoff(now, window);
        let mut per_user: HashMap<&str, u64> = HashMap::new();
        for event in snapshot.events_since(&self.event_type, cutoff) {
            let user = event.user_id.as_deref().unwrap_or(UNKNOWN_USER);
            *per_user.entry(user).or_default() += 1;
        }
        Ok(per_user.values().copied().max().unwrap_or(0) as f64)
    }
}
