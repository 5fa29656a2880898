//! Notification delivery.

pub mod message;
pub mod telegram;

pub use message::{escape_html, offer_message, summary_message};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Notifier not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<wreq::Error> for NotifyError {
    fn from(err: wreq::Error) -> Self {
        NotifyError::Network(err.to_string())
    }
}

/// A channel that delivers pre-formatted messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` (HTML with `<b>` emphasis, already escaped) to `recipient`.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}

/// Prints messages instead of sending them; used for dry runs.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        println!("--- to {} ---\n{}\n", recipient, text);
        Ok(())
    }
}
