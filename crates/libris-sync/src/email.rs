//! Outbound email contract.
//!
//! Delivery itself lives outside this workspace. The synchronizer only needs
//! to hand over a rendered message and learn whether it was accepted.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub from: String,
    pub reply_to: String,
    pub bcc: Option<String>,
}

/// Sends email messages.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message. Returns `false` when delivery failed.
    async fn send(&self, message: EmailMessage) -> bool;
}

/// Sender that only logs. Used when no mail gateway is wired in.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> bool {
        info!(to = %message.to, subject = %message.subject, "Email handed to log sender");
        true
    }
}

/// Recording sender for tests.
#[derive(Debug, Default)]
pub struct MockEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl MockEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose deliveries always fail (messages are still recorded).
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// All messages handed to the sender.
    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Most recent message sent to `to`.
    pub fn last_message_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent_messages().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, message: EmailMessage) -> bool {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        !self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "Your library account".into(),
            html_body: "<p>hello</p>".into(),
            from: "library@example.org".into(),
            reply_to: "library@example.org".into(),
            bcc: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_messages() {
        let sender = MockEmailSender::new();
        assert!(sender.send(message("a@example.org")).await);
        assert!(sender.send(message("b@example.org")).await);
        assert_eq!(sender.sent_messages().len(), 2);
        assert!(sender.last_message_to("b@example.org").is_some());
        assert!(sender.last_message_to("c@example.org").is_none());
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let sender = MockEmailSender::failing();
        assert!(!sender.send(message("a@example.org")).await);
        assert_eq!(sender.sent_messages().len(), 1);
    }
}
