use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace};

use crate::config::SmtpSettings;

/// A plain-text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address '{0}'")]
    Address(String),
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("SMTP error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Hands messages to an SMTP relay over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|_| MailError::Address(settings.from.clone()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!("SMTP relay configured: {}:{}", settings.host, settings.port);
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(to = %email.to))]
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MailError::Address(email.to.clone()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        trace!("Handing message to SMTP relay");
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Used when no SMTP relay is configured: records that a message would have
/// been sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "SMTP not configured, email not sent");
        trace!("Email body:\n{}", email.body);
        Ok(())
    }
}

/// Sends emails as detached tasks. Failures are logged and never reach the
/// operation that triggered the email.
#[derive(Clone)]
pub struct Notifications {
    mailer: Arc<dyn Mailer>,
}

impl Notifications {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn from_settings(smtp: Option<&SmtpSettings>) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = match smtp {
            Some(settings) => Arc::new(SmtpMailer::new(settings)?),
            None => {
                info!("No SMTP relay configured, emails will only be logged");
                Arc::new(LogMailer)
            }
        };
        Ok(Self::new(mailer))
    }

    pub fn dispatch(&self, email: Email) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);
        debug!(to = %email.to, subject = %email.subject, "Queueing email");
        tokio::spawn(async move {
            match mailer.send(&email).await {
                Ok(()) => info!("Email '{}' sent to {}", email.subject, email.to),
                Err(e) => error!("Failed to send email '{}' to {}: {}", email.subject, email.to, e),
            }
        })
    }
}
