use crate::error::AlertError;

/// Sink for engine failures that never reach a caller.
///
/// Snapshot failures and per-metric evaluation errors are handed here
/// instead of being returned from any public operation.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &AlertError);
}

/// Reports errors as `tracing` events.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &AlertError) {
        match error {
            AlertError::SnapshotUnavailable(_) | AlertError::InvalidSnapshot(_) => {
                tracing::error!(error = %error, "Evaluation tick aborted");
            }
            _ => {
                tracing::error!(
                    metric_id = error.metric_id().unwrap_or("-"),
                    error = %error,
                    "Metric evaluation error"
                );
            }
        }
    }
}
