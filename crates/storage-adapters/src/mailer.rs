//! Outbound mail transport.

use async_trait::async_trait;
use domains::{Email, Mailer, Result};

/// Writes every message to the log instead of an SMTP relay. Useful for
/// local runs where the verification link is copied out of the log.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "mail sent"
        );
        Ok(())
    }
}
