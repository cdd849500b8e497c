// ============================
// crates/backend-lib/src/notify.rs
// ============================
//! Outbound account notifications.
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox}, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use thiserror::Error;

use crate::config::SmtpSettings;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("could not build message: {0}")]
    Message(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Sends one message to one address
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        tracing::info!(to = address, subject, "notification not delivered: no mail relay configured");
        Ok(())
    }
}

/// Delivers notifications through an SMTP relay
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let transport = SmtpTransport::relay(&settings.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: settings.from.clone(),
        })
    }

    fn build_message(&self, address: &str, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Address(e.to_string()))?;
        let to: Mailbox = address
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Address(e.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(address, subject, body)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport blocks on network I/O
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::debug!(to = address, subject, "notification sent");
        Ok(())
    }
}
