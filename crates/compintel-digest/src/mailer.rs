//! Delivery capability for rendered digests.

use std::future::Future;

use lettre::{
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
  message::{Mailbox, MultiPart},
  transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

use crate::{Result, render::RenderedDigest};

pub trait Mailer: Send + Sync + 'static {
  /// Hand `digest` to the transport. An error means the digest was not sent.
  fn deliver<'a>(
    &'a self,
    digest: &'a RenderedDigest,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

// ─── Log-only ────────────────────────────────────────────────────────────────

/// Writes digests to the log. Used when no SMTP server is configured.
pub struct LogMailer {
  recipient: String,
}

impl LogMailer {
  pub fn new(recipient: impl Into<String>) -> Self { Self { recipient: recipient.into() } }
}

impl Mailer for LogMailer {
  async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
    tracing::info!(
      recipient = %self.recipient,
      subject = %digest.subject,
      "no SMTP transport configured; digest logged instead of sent"
    );
    tracing::debug!("{}", digest.text);
    Ok(())
  }
}

// ─── SMTP ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
  /// Plaintext. Only for local relays and test servers.
  None,
  #[default]
  StartTls,
  /// Implicit TLS (SMTPS).
  Tls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
  pub host:     String,
  #[serde(default = "default_smtp_port")]
  pub port:     u16,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub password: Option<String>,
  #[serde(default)]
  pub tls:      TlsMode,
}

fn default_smtp_port() -> u16 { 587 }

pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  from:      Mailbox,
  to:        Mailbox,
}

impl SmtpMailer {
  pub fn new(settings: &SmtpSettings, from: &str, to: &str) -> Result<Self> {
    let builder = match settings.tls {
      TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
      TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?,
      TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
    };
    let mut builder = builder.port(settings.port);
    if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
      builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    Ok(Self { transport: builder.build(), from: from.parse()?, to: to.parse()? })
  }

  fn message(&self, digest: &RenderedDigest) -> Result<Message> {
    let message = Message::builder()
      .from(self.from.clone())
      .to(self.to.clone())
      .subject(digest.subject.clone())
      .multipart(MultiPart::alternative_plain_html(digest.text.clone(), digest.html.clone()))?;
    Ok(message)
  }
}

impl Mailer for SmtpMailer {
  async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
    let message = self.message(digest)?;
    self.transport.send(message).await?;
    tracing::info!(recipient = %self.to, subject = %digest.subject, "digest sent");
    Ok(())
  }
}

// ─── Runtime selection ───────────────────────────────────────────────────────

pub enum MailerBackend {
  Log(LogMailer),
  Smtp(SmtpMailer),
}

impl Mailer for MailerBackend {
  async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
    match self {
      Self::Log(m) => m.deliver(digest).await,
      Self::Smtp(m) => m.deliver(digest).await,
    }
  }
}
