#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use authwatch_alert::report::ErrorReporter;
use authwatch_alert::{AlertError, MetricSnapshotProvider};
use authwatch_common::types::{AlertRecord, AuthEvent, MetricSnapshot, Severity, ThresholdRule};
use authwatch_notify::dispatcher::AlertDispatcher;
use authwatch_notify::routing::default_routes;
use authwatch_notify::{AlertHistorySink, NotificationChannel};
use authwatch_server::config::ServerConfig;
use authwatch_server::engine::AuthAlertEngine;
use authwatch_server::snapshot::StaticSnapshotProvider;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const UNAUTHORIZED: &str = "unauthorized_api_per_minute";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// `n` events of `event_type`, one second before `now`.
pub fn events(event_type: &str, n: usize, now: DateTime<Utc>) -> MetricSnapshot {
    MetricSnapshot {
        captured_at: Some(now),
        events: (0..n)
            .map(|_| AuthEvent::new(event_type, now - Duration::seconds(1)))
            .collect(),
        ..MetricSnapshot::default()
    }
}

pub fn unauthorized_rule() -> ThresholdRule {
    ThresholdRule::new(
        UNAUTHORIZED,
        50.0,
        60,
        Severity::Critical,
        "Unauthorized API requests per minute above normal",
    )
}

/// Channel that records every alert it receives, optionally failing.
pub struct RecordingChannel {
    name: String,
    fail: bool,
    pub received: Mutex<Vec<AlertRecord>>,
}

impl RecordingChannel {
    pub fn ok(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<()> {
        self.received.lock().unwrap().push(alert.clone());
        if self.fail {
            anyhow::bail!("{} is unreachable", self.name);
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
pub struct CollectingReporter {
    pub errors: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &AlertError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// Provider that fails, hangs, or counts its calls.
pub enum ScriptedProvider {
    Failing,
    Hanging,
    Counting(AtomicUsize),
}

impl ScriptedProvider {
    pub fn calls(&self) -> usize {
        match self {
            Self::Counting(calls) => calls.load(Ordering::SeqCst),
            _ => 0,
        }
    }
}

#[async_trait]
impl MetricSnapshotProvider for ScriptedProvider {
    async fn fetch(&self) -> Result<MetricSnapshot> {
        match self {
            Self::Failing => anyhow::bail!("metrics backend returned 503"),
            Self::Hanging => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(MetricSnapshot::default())
            }
            Self::Counting(calls) => {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(MetricSnapshot::default())
            }
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub engine: Arc<AuthAlertEngine>,
    pub snapshots: Arc<StaticSnapshotProvider>,
    pub chat: Arc<RecordingChannel>,
    pub issue_tracker: Arc<RecordingChannel>,
    pub email: Arc<RecordingChannel>,
    pub reporter: Arc<CollectingReporter>,
}

pub fn config_with(rules: Vec<ThresholdRule>) -> ServerConfig {
    ServerConfig {
        rules,
        ..ServerConfig::default()
    }
}

pub fn dispatcher_for(
    channels: Vec<Arc<dyn NotificationChannel>>,
    history: Option<Arc<dyn AlertHistorySink>>,
) -> Arc<AlertDispatcher> {
    Arc::new(AlertDispatcher::new(channels, default_routes(), history))
}

/// Engine over a static snapshot provider with three recording channels
/// named like the built-in ones.
pub fn harness(
    config: &ServerConfig,
    email: Arc<RecordingChannel>,
    history: Option<Arc<dyn AlertHistorySink>>,
) -> Harness {
    let snapshots = Arc::new(StaticSnapshotProvider::default());
    let chat = RecordingChannel::ok("chat");
    let issue_tracker = RecordingChannel::ok("issue_tracker");
    let reporter = Arc::new(CollectingReporter::default());

    let channels: Vec<Arc<dyn NotificationChannel>> = vec![
        chat.clone() as Arc<dyn NotificationChannel>,
        issue_tracker.clone(),
        email.clone(),
    ];
    let dispatcher = dispatcher_for(channels, history);
    let engine = AuthAlertEngine::new(config, snapshots.clone(), dispatcher, reporter.clone())
        .expect("engine should build");

    Harness {
        engine: Arc::new(engine),
        snapshots,
        chat,
        issue_tracker,
        email,
        reporter,
    }
}
