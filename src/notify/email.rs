//! Email notification channel using SMTP.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::{alert_text, Notifier, SUBJECT};
use crate::config::EmailConfig;
use crate::error::NotifyError;
use crate::models::Alert;

/// Sends one message per alert, addressed to every recipient.
pub struct EmailNotifier {
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    relay: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let sender = parse_mailbox(&config.username)?;
        let recipients = config
            .recipients
            .iter()
            .map(String::as_str)
            .map(parse_mailbox)
            .collect::<Result<Vec<_>, _>>()?;
        let password = config
            .password
            .clone()
            .ok_or(NotifyError::MissingCredential("SMTP password"))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username.clone(), password))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            sender,
            recipients,
            relay: format!("{}:{}", config.smtp_host, config.smtp_port),
            transport,
        })
    }

    fn build_message(&self, alert: &Alert) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(alert_text(alert))
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let message = self.build_message(alert)?;
        self.transport.send(message).await.map_err(|e| {
            // Permanent and transient errors carry an SMTP reply code,
            // anything else never reached the server.
            if e.is_permanent() || e.is_transient() {
                NotifyError::Rejected {
                    channel: "email",
                    reason: format!("{} ({})", e, self.relay),
                }
            } else {
                NotifyError::Transport(format!("{} ({})", e, self.relay))
            }
        })?;

        debug!(endpoint = %alert.endpoint, relay = %self.relay, "alert email sent");
        Ok(())
    }
}
