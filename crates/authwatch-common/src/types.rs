use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use authwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A threshold rule keyed by metric id.
///
/// The metric id is unique within a registry; registering a rule with an
/// existing id replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric_id: String,
    /// Fires when the observed value is strictly greater than this.
    pub threshold: f64,
    /// Trailing aggregation window in seconds.
    pub window_secs: u64,
    pub severity: Severity,
    pub description: String,
}

impl ThresholdRule {
    pub fn new(
        metric_id: impl Into<String>,
        threshold: f64,
        window_secs: u64,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            threshold,
            window_secs,
            severity,
            description: description.into(),
        }
    }

    /// The window as a chrono duration, or `None` if it does not fit.
    pub fn window(&self) -> Option<Duration> {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
    }
}

/// One auth-related event reported by the snapshot source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Event type tag, e.g. `"login_failure"` or `"redirect"`.
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl AuthEvent {
    pub fn new(event_type: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Point-in-time read of recent auth events and running counters.
///
/// One snapshot is fetched per evaluation tick and shared by every rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<AuthEvent>,
    #[serde(default)]
    pub counters: HashMap<String, f64>,
}

impl MetricSnapshot {
    /// Checks the snapshot before it is handed to the evaluator.
    ///
    /// Event types must be non-empty and counters finite and non-negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use authwatch_common::types::MetricSnapshot;
    ///
    /// let mut snapshot = MetricSnapshot::default();
    /// assert!(snapshot.validate().is_ok());
    ///
    /// snapshot.counters.insert("login_failures".into(), f64::NAN);
    /// assert!(snapshot.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if let Some(pos) = self.events.iter().position(|e| e.event_type.trim().is_empty()) {
            return Err(format!("event #{pos} has an empty event_type"));
        }
        for (name, value) in &self.counters {
            if !value.is_finite() || *value < 0.0 {
                return Err(format!("counter '{name}' has invalid value {value}"));
            }
        }
        Ok(())
    }

    /// Events of `event_type` with `timestamp > cutoff`.
    pub fn events_since<'a>(
        &'a self,
        event_type: &'a str,
        cutoff: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a AuthEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.event_type == event_type && e.timestamp > cutoff)
    }

    pub fn counter(&self, name: &str) -> Option<f64> {
        self.counters.get(name).copied()
    }
}

/// The payload produced by one firing. Handed unchanged to every
/// notification channel and to the history sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub metric_id: String,
    pub severity: Severity,
    pub description: String,
    pub value: f64,
    pub threshold: f64,
    pub window_secs: u64,
    pub fired_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn from_rule(rule: &ThresholdRule, value: f64, fired_at: DateTime<Utc>) -> Self {
        Self {
            id: crate::id::next_id(),
            metric_id: rule.metric_id.clone(),
            severity: rule.severity,
            description: rule.description.clone(),
            value,
            threshold: rule.threshold,
            window_secs: rule.window_secs,
            fired_at,
        }
    }

    /// One-line summary, used as the email subject.
    pub fn summary(&self) -> String {
        format!(
            "[authwatch][{}] {} = {} (threshold {}, window {}s)",
            self.severity, self.metric_id, self.value, self.threshold, self.window_secs
        )
    }
}
