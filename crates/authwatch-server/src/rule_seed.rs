use authwatch_alert::rules::{AggregatorTable, CountInWindow, MaxPerUserInWindow};
use authwatch_common::types::{Severity, ThresholdRule};

/// Default threshold definitions for first-time startup.
struct RuleDef {
    metric_id: &'static str,
    threshold: f64,
    window_secs: u64,
    severity: Severity,
    description: &'static str,
}

const DEFAULT_RULES: &[RuleDef] = &[
    RuleDef {
        metric_id: "redirect_rate_per_minute",
        threshold: 100.0,
        window_secs: 60,
        severity: Severity::Warning,
        description: "Auth redirect storm: too many login redirects per minute",
    },
    RuleDef {
        metric_id: "unauthorized_api_per_minute",
        threshold: 50.0,
        window_secs: 60,
        severity: Severity::Critical,
        description: "Unauthorized API requests per minute above normal",
    },
    RuleDef {
        metric_id: "permission_denied_per_minute",
        threshold: 30.0,
        window_secs: 60,
        severity: Severity::Warning,
        description: "Permission-denied responses per minute above normal",
    },
    RuleDef {
        metric_id: "login_failures_per_minute",
        threshold: 20.0,
        window_secs: 60,
        severity: Severity::Warning,
        description: "Login failures per minute above normal",
    },
    RuleDef {
        metric_id: "login_failures_per_user",
        threshold: 5.0,
        window_secs: 300,
        severity: Severity::Critical,
        description: "Possible brute force: repeated login failures for one account",
    },
    RuleDef {
        metric_id: "session_expiry_per_minute",
        threshold: 200.0,
        window_secs: 60,
        severity: Severity::Info,
        description: "Unusual number of session expirations per minute",
    },
    RuleDef {
        metric_id: "role_check_failures_per_minute",
        threshold: 10.0,
        window_secs: 60,
        severity: Severity::Warning,
        description: "Role check failures per minute above normal",
    },
];

/// The seed rule set used when the config file defines no rules.
pub fn default_rules() -> Vec<ThresholdRule> {
    DEFAULT_RULES
        .iter()
        .map(|def| {
            ThresholdRule::new(
                def.metric_id,
                def.threshold,
                def.window_secs,
                def.severity,
                def.description,
            )
        })
        .collect()
}

/// Aggregators for the seed metrics. `login_failures_per_minute` has no
/// entry and reads the counter of the same name.
pub fn default_aggregators() -> AggregatorTable {
    AggregatorTable::new()
        .with("redirect_rate_per_minute", CountInWindow::new("redirect"))
        .with("unauthorized_api_per_minute", CountInWindow::new("unauthorized_api"))
        .with("permission_denied_per_minute", CountInWindow::new("permission_denied"))
        .with("login_failures_per_user", MaxPerUserInWindow::new("login_failure"))
        .with("session_expiry_per_minute", CountInWindow::new("session_expired"))
        .with("role_check_failures_per_minute", CountInWindow::new("role_check_failure"))
}
