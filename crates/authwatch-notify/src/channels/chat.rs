use crate::error::NotifyError;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use authwatch_common::types::{AlertRecord, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Incoming-webhook URL. Unset disables the channel.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Posts a `{"text": ...}` message to a chat incoming webhook.
pub struct ChatWebhookChannel {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl ChatWebhookChannel {
    pub fn new(config: &ChatConfig) -> crate::error::Result<Self> {
        let webhook_url = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        if let Some(url) = &webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(NotifyError::InvalidConfig(format!(
                    "chat webhook_url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(Self {
            client: super::http_client()?,
            webhook_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub fn format_message(alert: &AlertRecord) -> String {
        let icon = match alert.severity {
            Severity::Critical => ":rotating_light:",
            Severity::Warning => ":warning:",
            Severity::Info => ":information_source:",
        };
        format!(
            "{icon} *{severity}* auth alert: {description}\n\
             > metric `{metric}` = {value} (threshold {threshold}, window {window}s)\n\
             > fired at {time}",
            severity = alert.severity.to_string().to_uppercase(),
            description = alert.description,
            metric = alert.metric_id,
            value = alert.value,
            threshold = alert.threshold,
            window = alert.window_secs,
            time = alert.fired_at.to_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for ChatWebhookChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!(metric_id = %alert.metric_id, "Chat webhook not configured, skipping");
            return Ok(());
        };

        let payload = serde_json::json!({ "text": Self::format_message(alert) });
        let resp = self.client.post(url.as_str()).json(&payload).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp
            .text()
            .await
            .map(|t| truncate_string(&t, MAX_BODY_LENGTH))
            .unwrap_or_else(|e| format!("[Failed to read response body: {e}]"));
        Err(NotifyError::ApiError {
            service: "chat".to_string(),
            status: status.as_u16(),
            body,
        }
        .into())
    }

    fn channel_name(&self) -> &str {
        "chat"
    }
}
