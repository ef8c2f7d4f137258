use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where a metric sits in its alert cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    /// No cooldown; the metric may fire on the next tick.
    Idle,
    /// Fired recently; further firings are suppressed until the expiry.
    CoolingDown,
}

/// Per-metric evaluation state, created lazily on first evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertState {
    pub metric_id: String,
    /// Last value computed from the snapshot, not a running increment.
    pub count: f64,
    pub window_start: DateTime<Utc>,
    pub last_alert_time: Option<DateTime<Utc>>,
    pub cooldown_expiry: Option<DateTime<Utc>>,
}

impl AlertState {
    pub fn new(metric_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            count: 0.0,
            window_start: now,
            last_alert_time: None,
            cooldown_expiry: None,
        }
    }

    pub fn phase(&self, now: DateTime<Utc>) -> AlertPhase {
        if self.is_cooling_down(now) {
            AlertPhase::CoolingDown
        } else {
            AlertPhase::Idle
        }
    }

    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_expiry.is_some_and(|expiry| now < expiry)
    }

    /// Drops an expiry that `now` has reached.
    pub(crate) fn clear_expired_cooldown(&mut self, now: DateTime<Utc>) {
        if self.cooldown_expiry.is_some_and(|expiry| now >= expiry) {
            self.cooldown_expiry = None;
        }
    }

    /// Starts a new window when strictly more than `window` has elapsed.
    /// Returns whether a reset happened.
    pub(crate) fn reset_window_if_elapsed(
        &mut self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        if now - self.window_start > window {
            self.count = 0.0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// Records a firing. A cooldown running past the last representable
    /// instant never expires.
    pub(crate) fn mark_fired(&mut self, now: DateTime<Utc>, cooldown: Duration) {
        let expiry = now.checked_add_signed(cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.last_alert_time = Some(now);
        self.cooldown_expiry = Some(expiry);
    }
}

/// Alert state for every evaluated metric.
///
/// Only the evaluator mutates entries. Removal happens through the
/// registry so a rule and its state disappear together.
#[derive(Default)]
pub struct AlertStateStore {
    states: Mutex<HashMap<String, AlertState>>,
}

impl AlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AlertState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state for `metric_id`, creating it with
    /// `window_start = now` if absent.
    pub(crate) fn update<R>(
        &self,
        metric_id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut AlertState) -> R,
    ) -> R {
        let mut states = self.lock();
        let state = states
            .entry(metric_id.to_string())
            .or_insert_with(|| AlertState::new(metric_id, now));
        f(state)
    }

    pub(crate) fn remove(&self, metric_id: &str) -> Option<AlertState> {
        self.lock().remove(metric_id)
    }

    pub fn get(&self, metric_id: &str) -> Option<AlertState> {
        self.lock().get(metric_id).cloned()
    }

    /// Read-only copy of every state, sorted by metric id.
    pub fn snapshot(&self) -> Vec<AlertState> {
        let mut states: Vec<AlertState> = self.lock().values().cloned().collect();
        states.sort_by(|a, b| a.metric_id.cmp(&b.metric_id));
        states
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
