use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound delivery of the finished report. Invoked exactly once per run.
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// SMTP delivery through the configured relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address '{}'", config.from))?;
        let to = config
            .to
            .parse()
            .with_context(|| format!("invalid recipient address '{}'", config.to))?;
        let tls_parameters = TlsParameters::new(config.host.clone())
            .context("failed to build SMTP TLS parameters")?;
        // Port 465 expects a TLS session from the first byte; everything
        // else starts in cleartext and upgrades with STARTTLS.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .tls(Tls::Wrapper(tls_parameters))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .tls(Tls::Required(tls_parameters))
        };
        let transport = builder
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string())
            .context("failed to assemble report message")?;
        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}
