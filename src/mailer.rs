//! Outbound email delivery.
//!
//! The account service composes [`MailRequest`]s and hands them to a
//! [`Mailer`]. Deployments with an SMTP relay use [`SmtpMailer`]; without one
//! the service falls back to [`LogMailer`], which logs the message and returns
//! `Ok(())`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MailRequest {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, mail: &MailRequest) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            html = %mail.html,
            "mailer send stub"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a TLS relay transport for `host`, authenticating when a username is given.
    ///
    /// # Errors
    /// Returns an error if the relay cannot be configured.
    pub fn new(host: &str, username: Option<String>, password: Option<SecretString>) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("Invalid SMTP relay: {host}"))?;

        if let Some(username) = username {
            let password = password
                .as_ref()
                .map(|password| password.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn build_message(mail: &MailRequest) -> Result<Message> {
    let from: Mailbox = mail
        .from
        .parse()
        .with_context(|| format!("Invalid sender address: {}", mail.from))?;
    let to: Mailbox = mail
        .to
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", mail.to))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.as_str())
        .user_agent(crate::APP_USER_AGENT.to_string())
        .header(ContentType::TEXT_HTML)
        .body(mail.html.clone())
        .context("Failed to build email message")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        let message = build_message(mail)?;
        let response = self
            .transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send email to {}", mail.to))?;
        debug!("SMTP response code: {}", response.code());
        Ok(())
    }
}
