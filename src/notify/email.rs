//! Alert email delivery via SMTP
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport. Messages are built
//! from an [`AlertEmail`], which keeps the notifier independent of the
//! transport so it can be exercised with a recording mailer.

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::common::settings::MailSettings;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled
    #[error("Email build error: {0}")]
    Build(String),

    #[error("SMTP is not configured (set mail.smtp_host or SMTP_HOST)")]
    NotConfigured,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A file attached to an alert email
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlAttachment {
    pub filename: String,
    pub content: String,
}

/// Transport-independent alert email
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<HtmlAttachment>,
}

/// Something that can deliver an [`AlertEmail`]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &AlertEmail) -> Result<(), EmailError>;
}

macro_rules! priority_header {
    ($ty:ident, $name:literal, $value:literal) => {
        #[derive(Debug, Clone, Copy)]
        struct $ty;

        impl Header for $ty {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($name)
            }

            fn parse(_: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                Ok($ty)
            }

            fn display(&self) -> HeaderValue {
                HeaderValue::new(Self::name(), $value.to_string())
            }
        }
    };
}

priority_header!(XPriority, "X-Priority", "1 (Highest)");
priority_header!(XMsMailPriority, "X-MSMail-Priority", "High");
priority_header!(Importance, "Importance", "High");

/// Build the MIME message for an alert: highest priority, plain-text body,
/// optional HTML attachment
pub fn build_message(email: &AlertEmail) -> Result<Message, EmailError> {
    let from: Mailbox = email.from.parse()?;
    let to: Mailbox = email.to.parse()?;

    let builder = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(XPriority)
        .header(XMsMailPriority)
        .header(Importance);

    let body = SinglePart::plain(email.body.clone());

    let message = match &email.attachment {
        Some(attachment) => builder.multipart(
            MultiPart::mixed().singlepart(body).singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), ContentType::TEXT_HTML),
            ),
        ),
        None => builder.singlepart(body),
    };

    message.map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// SmtpMailer
// ---------------------------------------------------------------------------

/// Sends alert emails through an SMTP relay
pub struct SmtpMailer {
    settings: MailSettings,
}

impl SmtpMailer {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &AlertEmail) -> Result<(), EmailError> {
        let host = self
            .settings
            .smtp_host
            .as_deref()
            .ok_or(EmailError::NotConfigured)?;

        let message = build_message(email)?;

        let mut transport_builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(self.settings.smtp_port);

        if let (Some(user), Some(pass)) = (&self.settings.smtp_user, &self.settings.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Alert email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
