//! Email delivery over SMTP.
//!
//! [`Mailer`] is the seam the drain worker talks to; [`SmtpMailer`] is the
//! production implementation on top of lettre's async tokio transport.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use uuid::Uuid;

use shopkeep_common::config::{SmtpConfig, SmtpTls};

/// SMTP connection timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("mailer configuration error: {0}")]
    Config(String),
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from_name: String,
    pub from_address: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Something that can deliver an [`EmailMessage`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Lettre-backed SMTP mailer.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = match config.tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Config(e.to_string()))?,
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Config(e.to_string()))?,
            SmtpTls::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            // App passwords are often pasted with spaces between groups
            let password: String = password.chars().filter(|c| !c.is_whitespace()).collect();
            builder = builder.credentials(Credentials::new(username.trim().to_string(), password));
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            "SMTP mailer configured"
        );

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        tracing::debug!(to = %message.to, "SMTP relay accepted message");
        Ok(())
    }
}

/// Turn an [`EmailMessage`] into a lettre `Message` with an HTML body and a
/// generated `Message-ID`.
pub fn build_message(message: &EmailMessage) -> Result<Message, MailError> {
    let from_address: Address = message
        .from_address
        .trim()
        .parse()
        .map_err(|_| MailError::InvalidAddress(message.from_address.clone()))?;
    let to_address: Address = message
        .to
        .trim()
        .parse()
        .map_err(|_| MailError::InvalidAddress(message.to.clone()))?;

    let message_id = format!("<{}@{}>", Uuid::new_v4(), from_address.domain());
    let from_name = Some(message.from_name.clone()).filter(|n| !n.is_empty());

    Message::builder()
        .from(Mailbox::new(from_name, from_address))
        .to(Mailbox::new(None, to_address))
        .subject(message.subject.as_str())
        .message_id(Some(message_id))
        .header(ContentType::TEXT_HTML)
        .body(message.html_body.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}
