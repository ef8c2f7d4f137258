//! The engine instance owned by the host process: registry, evaluator,
//! dispatcher and the periodic tick loop.

use anyhow::Context;
use authwatch_alert::evaluator::{ThresholdEvaluator, TickOutcome};
use authwatch_alert::registry::ThresholdRegistry;
use authwatch_alert::report::ErrorReporter;
use authwatch_alert::state::AlertState;
use authwatch_alert::{AlertError, MetricSnapshotProvider};
use authwatch_common::types::ThresholdRule;
use authwatch_notify::dispatcher::{AlertDispatcher, DispatchReport};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ServerConfig;

/// What one tick did, plus handles to the dispatches it started.
#[derive(Debug)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub dispatches: Vec<JoinHandle<DispatchReport>>,
}

impl TickReport {
    /// Waits for every dispatch started by this tick to settle.
    pub async fn settle(self) -> Vec<DispatchReport> {
        join_all(self.dispatches)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(error = %e, "Dispatch task failed to complete");
                    None
                }
            })
            .collect()
    }
}

struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct AuthAlertEngine {
    registry: Arc<ThresholdRegistry>,
    evaluator: ThresholdEvaluator,
    dispatcher: Arc<AlertDispatcher>,
    provider: Arc<dyn MetricSnapshotProvider>,
    reporter: Arc<dyn ErrorReporter>,
    tick_interval: Duration,
    snapshot_timeout: Duration,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl AuthAlertEngine {
    /// Builds an engine from `config`. Rules come from
    /// [`ServerConfig::effective_rules`]; the scheduler is not started.
    pub fn new(
        config: &ServerConfig,
        provider: Arc<dyn MetricSnapshotProvider>,
        dispatcher: Arc<AlertDispatcher>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let registry = Arc::new(
            ThresholdRegistry::with_rules(config.effective_rules())
                .context("Invalid threshold rules")?,
        );
        let evaluator = ThresholdEvaluator::new(
            registry.clone(),
            config.aggregator_table()?,
            config.cooldown_secs,
        );

        tracing::info!(
            rules = registry.len(),
            tick_secs = config.tick_secs,
            cooldown_secs = config.cooldown_secs,
            snapshot_source = provider.source_name(),
            "Auth alert engine initialized"
        );

        Ok(Self {
            registry,
            evaluator,
            dispatcher,
            provider,
            reporter,
            tick_interval: Duration::from_secs(config.tick_secs),
            snapshot_timeout: Duration::from_secs(config.snapshot_timeout_secs),
            scheduler: Mutex::new(None),
        })
    }

    /// Adds or replaces the rule for `rule.metric_id`. Existing alert state
    /// for that metric is kept.
    pub fn register_rule(
        &self,
        rule: ThresholdRule,
    ) -> authwatch_alert::Result<Option<ThresholdRule>> {
        self.registry.register(rule)
    }

    /// Removes a rule and discards its alert state.
    pub fn remove_rule(&self, metric_id: &str) -> Option<ThresholdRule> {
        self.registry.remove(metric_id)
    }

    pub fn rules(&self) -> Vec<ThresholdRule> {
        self.registry.list()
    }

    /// Copy of every tracked alert state, ordered by metric id.
    pub fn alert_states(&self) -> Vec<AlertState> {
        self.registry.states().snapshot()
    }

    pub fn alert_state(&self, metric_id: &str) -> Option<AlertState> {
        self.registry.states().get(metric_id)
    }

    /// Runs one evaluation tick at `now`.
    ///
    /// A snapshot that cannot be fetched in time or fails validation aborts
    /// the tick before any rule is evaluated. Every error, including
    /// per-metric ones, is handed to the reporter. Each fired alert is
    /// dispatched on its own task; the returned handles can be awaited with
    /// [`TickReport::settle`] but need not be.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, AlertError> {
        let fetched = tokio::time::timeout(self.snapshot_timeout, self.provider.fetch()).await;
        let snapshot = match fetched {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => return Err(self.abort(AlertError::SnapshotUnavailable(e))),
            Err(_) => {
                return Err(self.abort(AlertError::SnapshotUnavailable(anyhow::anyhow!(
                    "{} snapshot fetch timed out after {:?}",
                    self.provider.source_name(),
                    self.snapshot_timeout
                ))));
            }
        };

        if let Err(reason) = snapshot.validate() {
            return Err(self.abort(AlertError::InvalidSnapshot(reason)));
        }

        let outcome = self.evaluator.evaluate(&snapshot, now);
        for error in &outcome.errors {
            self.reporter.report(error);
        }

        let dispatches = outcome
            .fired
            .iter()
            .map(|alert| {
                let dispatcher = self.dispatcher.clone();
                let alert = alert.clone();
                tokio::spawn(async move { dispatcher.dispatch(&alert).await })
            })
            .collect();

        tracing::debug!(
            evaluated = outcome.evaluated,
            fired = outcome.fired.len(),
            suppressed = outcome.suppressed.len(),
            errors = outcome.errors.len(),
            "Evaluation tick completed"
        );

        Ok(TickReport {
            outcome,
            dispatches,
        })
    }

    fn abort(&self, error: AlertError) -> AlertError {
        self.reporter.report(&error);
        error
    }

    /// Starts the periodic tick loop. The first tick runs immediately.
    /// Returns `false` if the loop is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if scheduler.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            tracing::warn!("Auth alert engine already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.clone().run_loop(stop_rx));
        *scheduler = Some(SchedulerHandle { stop_tx, handle });
        true
    }

    /// Stops the tick loop and waits for it to exit. A tick already in
    /// progress is allowed to finish; dispatches it started are not
    /// cancelled. Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let taken = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(SchedulerHandle { stop_tx, handle }) = taken else {
            return false;
        };

        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
        tracing::info!("Auth alert engine stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    async fn run_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        tracing::info!(
            tick_secs = self.tick_interval.as_secs(),
            "Auth alert scheduler started"
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            // Failures were already reported; the next interval retries.
            let tick = AssertUnwindSafe(self.run_tick(Utc::now())).catch_unwind();
            if tick.await.is_err() {
                tracing::error!("Evaluation tick panicked; scheduler continues");
            }
        }
    }
}
