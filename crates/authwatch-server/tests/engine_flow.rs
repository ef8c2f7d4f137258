mod common;

use authwatch_alert::state::AlertPhase;
use authwatch_alert::AlertError;
use authwatch_common::types::{AuthEvent, MetricSnapshot, Severity, ThresholdRule};
use authwatch_notify::AlertHistorySink;
use authwatch_server::engine::AuthAlertEngine;
use authwatch_server::history::JsonlHistorySink;
use chrono::Duration;
use common::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

#[tokio::test]
async fn example_scenario_fires_dispatches_and_cools_down() {
    let h = harness(
        &config_with(vec![unauthorized_rule()]),
        RecordingChannel::ok("email"),
        None,
    );

    h.snapshots.set(events("unauthorized_api", 51, t0()));
    let tick = h.engine.run_tick(t0()).await.unwrap();
    assert_eq!(tick.outcome.fired.len(), 1);
    assert_eq!(tick.outcome.fired[0].value, 51.0);

    let reports = tick.settle().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].delivered().count(), 3);
    assert_eq!(h.chat.count(), 1);
    assert_eq!(h.issue_tracker.count(), 1);
    assert_eq!(h.email.count(), 1);

    let state = h.engine.alert_state(UNAUTHORIZED).unwrap();
    assert_eq!(state.cooldown_expiry, Some(t0() + Duration::minutes(5)));
    assert_eq!(state.phase(at(1)), AlertPhase::CoolingDown);

    // Two minutes later, still above threshold, still cooling down.
    h.snapshots.set(events("unauthorized_api", 80, at(120)));
    let tick = h.engine.run_tick(at(120)).await.unwrap();
    assert!(tick.outcome.fired.is_empty());
    assert_eq!(tick.outcome.suppressed, vec![UNAUTHORIZED.to_string()]);

    // Six minutes later, below threshold; the cooldown has lapsed.
    h.snapshots.set(events("unauthorized_api", 10, at(360)));
    let tick = h.engine.run_tick(at(360)).await.unwrap();
    assert!(tick.outcome.fired.is_empty());
    let state = h.engine.alert_state(UNAUTHORIZED).unwrap();
    assert_eq!(state.cooldown_expiry, None);
    assert_eq!(state.count, 10.0);
    assert_eq!(state.last_alert_time, Some(t0()));

    assert_eq!(h.chat.count(), 1);
    assert!(h.reporter.messages().is_empty());
}

#[tokio::test]
async fn failing_channel_does_not_block_the_other_two() {
    let h = harness(
        &config_with(vec![unauthorized_rule()]),
        RecordingChannel::failing("email"),
        None,
    );

    h.snapshots.set(events("unauthorized_api", 60, t0()));
    let reports = h.engine.run_tick(t0()).await.unwrap().settle().await;

    let report = &reports[0];
    assert_eq!(report.severity, Severity::Critical);
    assert!(report.outcome("chat").unwrap().is_success());
    assert!(report.outcome("issue_tracker").unwrap().is_success());
    let email = report.outcome("email").unwrap();
    assert!(email.error.as_deref().unwrap().contains("unreachable"));

    // Delivery failures stay inside the dispatcher.
    assert!(h.reporter.messages().is_empty());
}

#[tokio::test]
async fn warning_alert_is_routed_to_chat_only() {
    let rule = ThresholdRule::new(
        "role_check_failures_per_minute",
        10.0,
        60,
        Severity::Warning,
        "Role check failures",
    );
    let h = harness(&config_with(vec![rule]), RecordingChannel::ok("email"), None);

    h.snapshots.set(events("role_check_failure", 11, t0()));
    let reports = h.engine.run_tick(t0()).await.unwrap().settle().await;

    assert_eq!(reports[0].outcomes.len(), 1);
    assert_eq!(h.chat.count(), 1);
    assert_eq!(h.issue_tracker.count(), 0);
    assert_eq!(h.email.count(), 0);
}

#[tokio::test]
async fn snapshot_failure_aborts_tick_and_is_reported() {
    let reporter = Arc::new(CollectingReporter::default());
    let engine = AuthAlertEngine::new(
        &config_with(vec![unauthorized_rule()]),
        Arc::new(ScriptedProvider::Failing),
        dispatcher_for(Vec::new(), None),
        reporter.clone(),
    )
    .unwrap();

    let err = engine.run_tick(t0()).await.unwrap_err();
    assert!(matches!(err, AlertError::SnapshotUnavailable(_)));
    assert!(err.to_string().contains("503"));

    // No rule was evaluated, so no state was created.
    assert!(engine.alert_states().is_empty());
    assert_eq!(reporter.messages().len(), 1);
}

#[tokio::test]
async fn slow_snapshot_times_out() {
    let config = authwatch_server::config::ServerConfig {
        snapshot_timeout_secs: 1,
        ..config_with(vec![unauthorized_rule()])
    };
    let reporter = Arc::new(CollectingReporter::default());
    let engine = AuthAlertEngine::new(
        &config,
        Arc::new(ScriptedProvider::Hanging),
        dispatcher_for(Vec::new(), None),
        reporter.clone(),
    )
    .unwrap();

    let err = engine.run_tick(t0()).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert_eq!(reporter.messages().len(), 1);
}

#[tokio::test]
async fn invalid_snapshot_is_rejected_before_evaluation() {
    let h = harness(
        &config_with(vec![unauthorized_rule()]),
        RecordingChannel::ok("email"),
        None,
    );
    let mut snapshot = events("unauthorized_api", 60, t0());
    snapshot.events.push(AuthEvent::new("  ", t0()));
    h.snapshots.set(snapshot);

    let err = h.engine.run_tick(t0()).await.unwrap_err();
    assert!(matches!(err, AlertError::InvalidSnapshot(_)));
    assert!(h.engine.alert_states().is_empty());
    assert_eq!(h.chat.count(), 0);
    assert_eq!(h.reporter.messages().len(), 1);
}

#[tokio::test]
async fn per_metric_error_is_reported_and_others_still_fire() {
    // Window too large to represent as a duration.
    let broken = ThresholdRule::new(
        "login_failures_per_minute",
        20.0,
        u64::MAX,
        Severity::Warning,
        "Login failures",
    );
    let h = harness(
        &config_with(vec![unauthorized_rule(), broken]),
        RecordingChannel::ok("email"),
        None,
    );

    h.snapshots.set(events("unauthorized_api", 51, t0()));
    let tick = h.engine.run_tick(t0()).await.unwrap();
    assert_eq!(tick.outcome.fired.len(), 1);
    assert_eq!(tick.outcome.errors.len(), 1);
    assert_eq!(
        tick.outcome.errors[0].metric_id(),
        Some("login_failures_per_minute")
    );
    assert_eq!(h.reporter.messages().len(), 1);
}

#[tokio::test]
async fn removed_rule_is_skipped_and_reregistration_starts_fresh() {
    let h = harness(
        &config_with(vec![unauthorized_rule()]),
        RecordingChannel::ok("email"),
        None,
    );

    h.snapshots.set(events("unauthorized_api", 10, t0()));
    h.engine.run_tick(t0()).await.unwrap();
    assert!(h.engine.alert_state(UNAUTHORIZED).is_some());

    assert!(h.engine.remove_rule(UNAUTHORIZED).is_some());
    assert!(h.engine.alert_state(UNAUTHORIZED).is_none());
    assert!(h.engine.rules().is_empty());

    let tick = h.engine.run_tick(at(30)).await.unwrap();
    assert_eq!(tick.outcome.evaluated, 0);
    assert!(h.engine.alert_states().is_empty());

    h.engine.register_rule(unauthorized_rule()).unwrap();
    h.engine.run_tick(at(45)).await.unwrap();
    let state = h.engine.alert_state(UNAUTHORIZED).unwrap();
    assert_eq!(state.window_start, at(45));
}

#[tokio::test]
async fn seed_rules_are_used_when_none_configured() {
    let h = harness(&config_with(Vec::new()), RecordingChannel::ok("email"), None);
    assert_eq!(h.engine.rules().len(), 7);

    let mut snapshot = MetricSnapshot::default();
    for user in ["alice", "bob"] {
        let count = if user == "alice" { 3 } else { 6 };
        for _ in 0..count {
            let event = AuthEvent::new("login_failure", t0() - Duration::seconds(10));
            snapshot.events.push(event.with_user(user));
        }
    }
    snapshot
        .counters
        .insert("login_failures_per_minute".to_string(), 21.0);
    h.snapshots.set(snapshot);

    let tick = h.engine.run_tick(t0()).await.unwrap();
    let mut fired: Vec<_> = tick
        .outcome
        .fired
        .iter()
        .map(|a| (a.metric_id.clone(), a.value))
        .collect();
    fired.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        fired,
        vec![
            ("login_failures_per_minute".to_string(), 21.0),
            ("login_failures_per_user".to_string(), 6.0),
        ]
    );
    assert_eq!(h.engine.alert_states().len(), 7);
}

#[tokio::test]
async fn fired_alerts_are_appended_to_history() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonlHistorySink::new(dir.path().join("history.jsonl")));
    let h = harness(
        &config_with(vec![unauthorized_rule()]),
        RecordingChannel::failing("email"),
        Some(sink.clone() as Arc<dyn AlertHistorySink>),
    );

    h.snapshots.set(events("unauthorized_api", 75, t0()));
    let fired_id = h.engine.run_tick(t0()).await.unwrap().outcome.fired[0]
        .id
        .clone();

    // The history write is detached from dispatch; poll until it lands.
    let mut records = Vec::new();
    for _ in 0..100 {
        records = sink.load().await.unwrap();
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, fired_id);
    assert_eq!(records[0].value, 75.0);
    assert_eq!(records[0].window_secs, 60);
}

#[tokio::test]
async fn scheduler_ticks_until_stopped() {
    let provider = Arc::new(ScriptedProvider::Counting(AtomicUsize::new(0)));
    let config = authwatch_server::config::ServerConfig {
        tick_secs: 1,
        ..config_with(vec![unauthorized_rule()])
    };
    let engine = Arc::new(
        AuthAlertEngine::new(
            &config,
            provider.clone(),
            dispatcher_for(Vec::new(), None),
            Arc::new(CollectingReporter::default()),
        )
        .unwrap(),
    );

    assert!(engine.start());
    assert!(!engine.start(), "second start must be rejected");
    assert!(engine.is_running());

    // The first tick fires immediately.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(provider.calls() >= 1);

    assert!(engine.stop().await);
    assert!(!engine.is_running());
    let calls_at_stop = provider.calls();

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(provider.calls(), calls_at_stop);
    assert!(!engine.stop().await);

    // Restart after stop is allowed.
    assert!(engine.start());
    assert!(engine.stop().await);
}

#[tokio::test]
async fn out_of_range_window_does_not_stop_the_scheduler() {
    let huge = ThresholdRule::new(
        "redirect_rate_per_minute",
        100.0,
        10_000_000_000_000,
        Severity::Warning,
        "Redirect storm",
    );
    let h = harness(&config_with(vec![huge]), RecordingChannel::ok("email"), None);

    assert!(h.engine.start());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(h.engine.is_running());
    let messages = h.reporter.messages();
    assert!(!messages.is_empty());
    assert!(messages[0].contains("out of range"), "{messages:?}");
    assert!(h.engine.stop().await);
}
