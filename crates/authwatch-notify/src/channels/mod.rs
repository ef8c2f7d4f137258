//! Built-in notification channels.

pub mod chat;
pub mod email;
pub mod issue_tracker;

use std::time::Duration;

/// Per-request timeout for HTTP-based channels.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> crate::error::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("authwatch/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
