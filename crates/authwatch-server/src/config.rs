use anyhow::Context;
use authwatch_alert::rules::{AggregationSpec, AggregatorTable};
use authwatch_common::types::ThresholdRule;
use authwatch_notify::channels::chat::{ChatConfig, ChatWebhookChannel};
use authwatch_notify::channels::email::{EmailChannel, EmailConfig};
use authwatch_notify::channels::issue_tracker::{IssueTrackerChannel, IssueTrackerConfig};
use authwatch_notify::routing::{default_routes, ChannelRoute};
use authwatch_notify::NotificationChannel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::rule_seed;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Seconds between evaluation ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Suppression period after a firing, shared by all metrics.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Upper bound on one snapshot fetch.
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_secs: u64,
    /// Snowflake node id (0-31) for alert record ids.
    #[serde(default = "default_node_id")]
    pub node_id: i32,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default = "default_routes")]
    pub routes: Vec<ChannelRoute>,
    /// Replaces the seed rule set when non-empty.
    #[serde(default)]
    pub rules: Vec<ThresholdRule>,
    /// Added on top of the seed aggregators, replacing same-id entries.
    #[serde(default)]
    pub aggregations: Vec<AggregationSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Endpoint returning a JSON metric snapshot. Unset means an always-empty
    /// snapshot.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON-lines file receiving every fired alert. Unset disables history.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub issue_tracker: IssueTrackerConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl NotifyConfig {
    /// Builds the three built-in channels. Channels without credentials are
    /// still returned and act as no-ops.
    pub fn build_channels(&self) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
        let chat = ChatWebhookChannel::new(&self.chat).context("Invalid chat channel config")?;
        let issues = IssueTrackerChannel::new(&self.issue_tracker)
            .context("Invalid issue tracker channel config")?;
        let email = EmailChannel::new(&self.email).context("Invalid email channel config")?;

        tracing::info!(
            chat = chat.is_configured(),
            issue_tracker = issues.is_configured(),
            email = email.is_configured(),
            "Notification channels initialized"
        );

        Ok(vec![Arc::new(chat), Arc::new(issues), Arc::new(email)])
    }
}

fn default_tick_secs() -> u64 {
    30
}

fn default_cooldown_secs() -> u64 {
    authwatch_alert::evaluator::DEFAULT_COOLDOWN_SECS
}

fn default_snapshot_timeout_secs() -> u64 {
    10
}

fn default_node_id() -> i32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            cooldown_secs: default_cooldown_secs(),
            snapshot_timeout_secs: default_snapshot_timeout_secs(),
            node_id: default_node_id(),
            snapshot: SnapshotConfig::default(),
            history: HistoryConfig::default(),
            notify: NotifyConfig::default(),
            routes: default_routes(),
            rules: Vec::new(),
            aggregations: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads a TOML config file, then applies `AUTHWATCH_*` environment
    /// overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields defaults.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            return Self::load(path);
        }
        tracing::warn!(path, "Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides secrets and endpoints from the environment. `lookup`
    /// abstracts `std::env::var` so tests can supply their own values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AUTHWATCH_SNAPSHOT_URL") {
            self.snapshot.url = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_CHAT_WEBHOOK_URL") {
            self.notify.chat.webhook_url = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_ISSUE_TOKEN") {
            self.notify.issue_tracker.token = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_ISSUE_REPOSITORY") {
            self.notify.issue_tracker.repository = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_SMTP_HOST") {
            self.notify.email.smtp_host = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_SMTP_USERNAME") {
            self.notify.email.smtp_username = Some(v);
        }
        if let Some(v) = get("AUTHWATCH_SMTP_PASSWORD") {
            self.notify.email.smtp_password = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_secs == 0 {
            anyhow::bail!("tick_secs must be greater than zero");
        }
        if self.snapshot_timeout_secs == 0 {
            anyhow::bail!("snapshot_timeout_secs must be greater than zero");
        }
        if !(0..=31).contains(&self.node_id) {
            anyhow::bail!("node_id must be in 0..=31, got {}", self.node_id);
        }
        if let Some(rule) = self.rules.iter().find(|r| r.metric_id.trim().is_empty()) {
            anyhow::bail!("rule with description '{}' has an empty metric_id", rule.description);
        }
        Ok(())
    }

    /// Configured rules, or the seed set when none are configured.
    pub fn effective_rules(&self) -> Vec<ThresholdRule> {
        if self.rules.is_empty() {
            rule_seed::default_rules()
        } else {
            self.rules.clone()
        }
    }

    /// Seed aggregators with configured specs applied on top.
    pub fn aggregator_table(&self) -> anyhow::Result<AggregatorTable> {
        let mut table = rule_seed::default_aggregators();
        table
            .extend_from_specs(&self.aggregations)
            .context("Invalid aggregation config")?;
        Ok(table)
    }

    /// The config as JSON with secrets masked, for startup logging.
    pub fn redacted(&self) -> serde_json::Value {
        let value = serde_json::to_value(self).unwrap_or_default();
        authwatch_notify::utils::redact_sensitive_json(&value)
    }
}
