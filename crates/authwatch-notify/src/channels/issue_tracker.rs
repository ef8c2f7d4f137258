use crate::error::NotifyError;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use authwatch_common::types::AlertRecord;
use serde::{Deserialize, Serialize};

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_labels() -> Vec<String> {
    vec!["security".to_string(), "auth-alert".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTrackerConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token. Unset disables the channel.
    #[serde(default)]
    pub token: Option<String>,
    /// Target repository as `owner/name`. Unset disables the channel.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for IssueTrackerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            repository: None,
            labels: default_labels(),
        }
    }
}

struct Target {
    url: String,
    token: String,
}

/// Opens an issue per alert through a GitHub-compatible REST API.
pub struct IssueTrackerChannel {
    client: reqwest::Client,
    target: Option<Target>,
    labels: Vec<String>,
}

impl IssueTrackerChannel {
    pub fn new(config: &IssueTrackerConfig) -> crate::error::Result<Self> {
        let token = config.token.as_deref().filter(|t| !t.trim().is_empty());
        let repository = config.repository.as_deref().filter(|r| !r.trim().is_empty());

        let target = match (token, repository) {
            (Some(token), Some(repository)) => {
                let repository = repository.trim();
                if repository.split('/').filter(|p| !p.is_empty()).count() != 2 {
                    return Err(NotifyError::InvalidConfig(format!(
                        "issue tracker repository must be 'owner/name', got '{repository}'"
                    )));
                }
                Some(Target {
                    url: format!(
                        "{}/repos/{}/issues",
                        config.api_url.trim_end_matches('/'),
                        repository
                    ),
                    token: token.trim().to_string(),
                })
            }
            _ => None,
        };

        Ok(Self {
            client: super::http_client()?,
            target,
            labels: config.labels.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    /// Issue endpoint, when configured.
    pub fn issues_url(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.url.as_str())
    }

    pub fn format_issue(alert: &AlertRecord) -> (String, String) {
        let title = format!(
            "[{}] {} exceeded threshold",
            alert.severity.to_string().to_uppercase(),
            alert.metric_id
        );
        let body = format!(
            "## Auth security alert\n\n\
             {description}\n\n\
             | Field | Value |\n\
             |---|---|\n\
             | Metric | `{metric}` |\n\
             | Severity | {severity} |\n\
             | Observed | {value} |\n\
             | Threshold | {threshold} |\n\
             | Window | {window}s |\n\
             | Fired at | {time} |\n\
             | Alert id | {id} |",
            description = alert.description,
            metric = alert.metric_id,
            severity = alert.severity,
            value = alert.value,
            threshold = alert.threshold,
            window = alert.window_secs,
            time = alert.fired_at.to_rfc3339(),
            id = alert.id,
        );
        (title, body)
    }
}

#[async_trait]
impl NotificationChannel for IssueTrackerChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<()> {
        let Some(target) = &self.target else {
            tracing::debug!(metric_id = %alert.metric_id, "Issue tracker not configured, skipping");
            return Ok(());
        };

        let (title, body) = Self::format_issue(alert);
        let payload = serde_json::json!({
            "title": title,
            "body": body,
            "labels": self.labels,
        });

        let resp = self
            .client
            .post(target.url.as_str())
            .bearer_auth(&target.token)
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await?;

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
            service: "issue_tracker".to_string(),
            status: status.as_u16(),
            body,
        }
        .into())
    }

    fn channel_name(&self) -> &str {
        "issue_tracker"
    }
}
