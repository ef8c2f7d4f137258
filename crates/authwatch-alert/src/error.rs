/// Errors raised while registering rules or evaluating a tick.
///
/// None of these are fatal to the engine: snapshot errors abort a single
/// tick and per-metric errors skip a single rule.
///
/// # Examples
///
/// ```rust
/// use authwatch_alert::error::AlertError;
///
/// let err = AlertError::NonFiniteValue {
///     metric_id: "login_failures_per_minute".to_string(),
///     value: f64::NAN,
/// };
/// assert!(err.to_string().contains("login_failures_per_minute"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A rule was registered without a metric id.
    #[error("Alert: metric id must not be empty")]
    EmptyMetricId,

    /// The snapshot provider failed or timed out.
    #[error("Alert: metric snapshot unavailable: {0:#}")]
    SnapshotUnavailable(anyhow::Error),

    /// The snapshot was fetched but failed the ingestion check.
    #[error("Alert: invalid metric snapshot: {0}")]
    InvalidSnapshot(String),

    /// The rule's window does not fit a duration, or reaches back past the
    /// earliest representable instant.
    #[error("Alert: window of {window_secs}s for '{metric_id}' is out of range")]
    WindowOutOfRange { metric_id: String, window_secs: u64 },

    /// Aggregation produced NaN or infinity.
    #[error("Alert: '{metric_id}' produced a non-finite value ({value})")]
    NonFiniteValue { metric_id: String, value: f64 },

    /// An aggregation spec named a kind that does not exist.
    #[error("Alert: unknown aggregation kind '{0}'")]
    UnknownAggregation(String),

    /// An aggregation spec is missing a field its kind requires.
    #[error("Alert: aggregation for '{metric_id}' requires '{field}'")]
    MissingAggregationField {
        metric_id: String,
        field: &'static str,
    },
}

impl AlertError {
    /// The metric this error is scoped to, if any.
    pub fn metric_id(&self) -> Option<&str> {
        match self {
            Self::WindowOutOfRange { metric_id, .. }
            | Self::NonFiniteValue { metric_id, .. }
            | Self::MissingAggregationField { metric_id, .. } => Some(metric_id),
            _ => None,
        }
    }
}

/// Convenience `Result` alias for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
