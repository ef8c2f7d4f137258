/// Errors that can occur within the notification subsystem.
///
/// The [`NotificationChannel`](crate::NotificationChannel) trait returns
/// `anyhow::Result`; channels raise these variants and convert them at the
/// trait boundary.
///
/// # Examples
///
/// ```rust
/// use authwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("smtp_port must be non-zero".to_string());
/// assert!(err.to_string().contains("smtp_port"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    SmtpError(String),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    /// A channel panicked while sending.
    #[error("Notify: channel '{0}' panicked")]
    ChannelPanicked(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
