use crate::error::NotifyError;
use crate::routing::ChannelRoute;
use crate::{AlertHistorySink, NotificationChannel};
use authwatch_common::types::{AlertRecord, Severity};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// How one channel handled one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: String,
    /// `None` on success, otherwise the rendered error chain.
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Settled result of one dispatch: every selected channel has either
/// delivered or failed by the time this is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub alert_id: String,
    pub metric_id: String,
    pub severity: Severity,
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

/// Fans fired alerts out to the channels their severity routes to.
pub struct AlertDispatcher {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    routes: Vec<ChannelRoute>,
    history: Option<Arc<dyn AlertHistorySink>>,
}

impl AlertDispatcher {
    pub fn new(
        channels: Vec<Arc<dyn NotificationChannel>>,
        routes: Vec<ChannelRoute>,
        history: Option<Arc<dyn AlertHistorySink>>,
    ) -> Self {
        let channels: HashMap<String, Arc<dyn NotificationChannel>> = channels
            .into_iter()
            .map(|c| (c.channel_name().to_string(), c))
            .collect();

        for route in &routes {
            if !channels.contains_key(&route.channel) {
                tracing::warn!(
                    channel = %route.channel,
                    "Route references an unconfigured channel and will be skipped"
                );
            }
        }

        Self {
            channels,
            routes,
            history,
        }
    }

    /// Channels selected for `severity`, in route order, without duplicates.
    pub fn channels_for(&self, severity: Severity) -> Vec<Arc<dyn NotificationChannel>> {
        let mut selected: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        for route in &self.routes {
            if !route.should_send(severity) {
                continue;
            }
            let Some(channel) = self.channels.get(&route.channel) else {
                continue;
            };
            if selected
                .iter()
                .all(|c| c.channel_name() != channel.channel_name())
            {
                selected.push(channel.clone());
            }
        }
        selected
    }

    /// Delivers `alert` to every routed channel concurrently and waits for
    /// all of them to settle. Channel errors and panics are captured in the
    /// report and never propagate. The history write is spawned and not
    /// awaited.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn dispatch(&self, alert: &AlertRecord) -> DispatchReport {
        self.record_history(alert);

        let targets = self.channels_for(alert.severity);
        if targets.is_empty() {
            tracing::info!(
                metric_id = %alert.metric_id,
                severity = %alert.severity,
                value = alert.value,
                threshold = alert.threshold,
                "Alert fired; no external channel routed for this severity"
            );
        }

        let sends = targets.into_iter().map(|channel| async move {
            let name = channel.channel_name().to_string();
            let result = AssertUnwindSafe(channel.send(alert))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(NotifyError::ChannelPanicked(name.clone()).into()));

            match result {
                Ok(()) => {
                    tracing::info!(
                        channel = %name,
                        metric_id = %alert.metric_id,
                        "Notification sent"
                    );
                    ChannelOutcome {
                        channel: name,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        channel = %name,
                        metric_id = %alert.metric_id,
                        error = %e,
                        "Failed to send notification"
                    );
                    ChannelOutcome {
                        channel: name,
                        error: Some(format!("{e:#}")),
                    }
                }
            }
        });

        let outcomes = join_all(sends).await;

        DispatchReport {
            alert_id: alert.id.clone(),
            metric_id: alert.metric_id.clone(),
            severity: alert.severity,
            outcomes,
        }
    }

    fn record_history(&self, alert: &AlertRecord) {
        let Some(sink) = self.history.clone() else {
            return;
        };
        let alert = alert.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.record(&alert).await {
                tracing::warn!(
                    metric_id = %alert.metric_id,
                    alert_id = %alert.id,
                    error = %e,
                    "Failed to write alert history"
                );
            }
        });
    }
}
