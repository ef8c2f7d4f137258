use crate::error::NotifyError;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use authwatch_common::types::AlertRecord;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host. Unset disables the channel.
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: None,
            recipients: Vec::new(),
        }
    }
}

struct Relay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

/// Sends a plain-text mail per alert to every configured recipient.
pub struct EmailChannel {
    relay: Option<Relay>,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> crate::error::Result<Self> {
        let host = config.smtp_host.as_deref().filter(|h| !h.trim().is_empty());
        let from = config.from.as_deref().filter(|f| !f.trim().is_empty());

        let relay = match (host, from) {
            (Some(host), Some(from)) => {
                if config.smtp_port == 0 {
                    return Err(NotifyError::InvalidConfig(
                        "smtp_port must be non-zero".to_string(),
                    ));
                }
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host.trim())
                    .map_err(|e| NotifyError::SmtpError(e.to_string()))?
                    .port(config.smtp_port);
                if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Some(Relay {
                    transport: builder.build(),
                    from: from.trim().to_string(),
                })
            }
            _ => None,
        };

        Ok(Self {
            relay,
            recipients: config.recipients.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.relay.is_some() && !self.recipients.is_empty()
    }

    pub fn format_subject(alert: &AlertRecord) -> String {
        alert.summary()
    }

    pub fn format_body(alert: &AlertRecord) -> String {
        format!(
            "Alert: {severity}\nMetric: {metric}\nDescription: {description}\nValue: {value}\nThreshold: {threshold}\nWindow: {window}s\nTime: {time}\nAlert ID: {id}",
            severity = alert.severity,
            metric = alert.metric_id,
            description = alert.description,
            value = alert.value,
            threshold = alert.threshold,
            window = alert.window_secs,
            time = alert.fired_at.to_rfc3339(),
            id = alert.id,
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<()> {
        let Some(relay) = &self.relay else {
            tracing::debug!(metric_id = %alert.metric_id, "SMTP relay not configured, skipping");
            return Ok(());
        };
        if self.recipients.is_empty() {
            tracing::debug!(metric_id = %alert.metric_id, "No email recipients, skipping");
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(relay.from.parse()?)
            .subject(Self::format_subject(alert))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder.body(Self::format_body(alert))?;

        relay
            .transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
