//! Alert delivery with severity-based channel routing.
//!
//! The [`dispatcher::AlertDispatcher`] sends every fired
//! [`AlertRecord`] to the [`NotificationChannel`]s whose route admits its
//! severity, concurrently and with failures isolated per channel, and
//! hands a copy to the optional [`AlertHistorySink`]. Built-in channels
//! cover a chat webhook, an issue tracker and SMTP email.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod routing;
pub mod utils;


use anyhow::Result;
use async_trait::async_trait;
use authwatch_common::types::AlertRecord;

/// A notification delivery channel that sends alert records to an
/// external service (chat webhook, issue tracker, SMTP relay).
///
/// A channel whose credentials are absent must succeed without doing
/// anything rather than fail.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert through this channel. Called once per alert;
    /// implementations do not retry.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    async fn send(&self, alert: &AlertRecord) -> Result<()>;

    /// Returns the channel name used by routes (e.g. `"chat"`).
    fn channel_name(&self) -> &str;
}

/// Best-effort persistence of fired alerts.
#[async_trait]
pub trait AlertHistorySink: Send + Sync {
    async fn record(&self, alert: &AlertRecord) -> Result<()>;
}
