use std::{fmt, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::SmtpTls;

/// One outbound message together with the relay it goes through.
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub auth_secret: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl fmt::Debug for OutgoingEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingEmail")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("auth_secret", &"<redacted>")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Email transport capability.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

/// Delivers through an SMTP relay. A non-empty `auth_secret` enables login
/// with the sender address as username.
#[derive(Clone, Debug)]
pub struct SmtpEmailSender {
    tls: SmtpTls,
    timeout: Duration,
}

impl SmtpEmailSender {
    pub fn new(tls: SmtpTls, timeout: Duration) -> Self {
        Self { tls, timeout }
    }

    fn transport(&self, email: &OutgoingEmail) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match self.tls {
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&email.host),
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.host)
                    .with_context(|| format!("smtp starttls relay {}", email.host))?
            }
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&email.host)
                .with_context(|| format!("smtp relay {}", email.host))?,
        };
        let mut builder = builder.port(email.port).timeout(Some(self.timeout));

        if !email.auth_secret.is_empty() {
            builder = builder.credentials(Credentials::new(
                email.from.clone(),
                email.auth_secret.clone(),
            ));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(email.from.parse().context("parse sender address")?)
            .to(email.to.parse().context("parse recipient address")?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("build email message")?;

        let response = self
            .transport(email)?
            .send(message)
            .await
            .with_context(|| format!("smtp send via {}:{}", email.host, email.port))?;
        debug!(code = %response.code(), "smtp accepted message");
        Ok(())
    }
}

/// Local dev sender that logs the message instead of sending it.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "email send stub"
        );
        Ok(())
    }
}
