//! Threshold evaluation for auth-security metrics.
//!
//! A [`registry::ThresholdRegistry`] holds one rule per metric id and owns
//! the paired [`state::AlertStateStore`]. On every tick the
//! [`evaluator::ThresholdEvaluator`] aggregates a shared
//! [`MetricSnapshot`] through the configured [`MetricAggregator`]s,
//! applies window-reset and cooldown rules, and returns the alerts that
//! fired. Delivery of those alerts is left to the caller.

pub mod error;
pub mod evaluator;
pub mod registry;
pub mod report;
pub mod rules;
pub mod state;


pub use error::{AlertError, Result};

use async_trait::async_trait;
use authwatch_common::types::MetricSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Computes the current value of one metric from a snapshot.
///
/// Implementations are registered per metric id in an
/// [`rules::AggregatorTable`]. Metric ids without an entry fall back to a
/// raw counter read.
pub trait MetricAggregator: Send + Sync {
    /// Short kind name used in logs (e.g. `"count"`).
    fn kind(&self) -> &str;

    /// Returns the metric value for the trailing `window` ending at `now`.
    fn compute(&self, snapshot: &MetricSnapshot, window: Duration, now: DateTime<Utc>)
        -> Result<f64>;
}

/// Source of the per-tick auth event snapshot.
#[async_trait]
pub trait MetricSnapshotProvider: Send + Sync {
    /// Fetches the current snapshot.
    ///
    /// # Errors
    ///
    /// Any error aborts the tick that requested the snapshot.
    async fn fetch(&self) -> anyhow::Result<MetricSnapshot>;

    /// Name used in logs (e.g. `"http"`).
    fn source_name(&self) -> &str;
}
