use authwatch_common::types::Severity;
use serde::{Deserialize, Serialize};

/// Sends alerts at or above `min_severity` to the named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRoute {
    pub channel: String,
    pub min_severity: Severity,
}

impl ChannelRoute {
    pub fn new(channel: impl Into<String>, min_severity: Severity) -> Self {
        Self {
            channel: channel.into(),
            min_severity,
        }
    }

    pub fn should_send(&self, event_severity: Severity) -> bool {
        event_severity >= self.min_severity
    }
}

/// Critical goes to chat, issue tracker and email; warning to chat only;
/// info stays local.
pub fn default_routes() -> Vec<ChannelRoute> {
    vec![
        ChannelRoute::new("chat", Severity::Warning),
        ChannelRoute::new("issue_tracker", Severity::Critical),
        ChannelRoute::new("email", Severity::Critical),
    ]
}
