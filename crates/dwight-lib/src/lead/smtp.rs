use std::time::Duration;

use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{LeadRecord, LeadSink};
use crate::config::SmtpConfig;

/// Sends a plain-text notification per lead over SMTP with STARTTLS.
pub struct SmtpSink {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpSink {
    /// Builds the transport; no connection is made until the first delivery.
    pub fn new(config: &SmtpConfig, timeout: Duration) -> anyhow::Result<Self> {
        let from: Mailbox = config
            .username
            .parse()
            .with_context(|| format!("invalid SMTP sender address {:?}", config.username))?;
        let to: Mailbox = config.notification_email.parse().with_context(|| {
            format!(
                "invalid notification address {:?}",
                config.notification_email
            )
        })?;
        let transport = SmtpTransport::starttls_relay(&config.host)
            .with_context(|| format!("invalid SMTP host {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();
        Ok(Self {
            transport,
            from,
            to,
        })
    }

    fn message(&self, lead: &LeadRecord) -> anyhow::Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("New Lead from Dwight Chatbot - {}", lead.email))
            .header(ContentType::TEXT_PLAIN)
            .body(notification_body(lead))
            .context("failed to build lead notification email")
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

fn notification_body(lead: &LeadRecord) -> String {
    format!(
        "New Lead Captured from Chatbot\n\n\
         Timestamp: {}\n\
         Name: {}\n\
         Email: {}\n\
         Phone: {}\n\n\
         Query Context:\n{}\n\n\
         ---\n\
         This is an automated notification from Dwight.\n",
        lead.timestamp,
        or_placeholder(&lead.name, "Not provided"),
        lead.email,
        lead.phone,
        or_placeholder(&lead.query_context, "No context available"),
    )
}

impl LeadSink for SmtpSink {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn deliver(&self, lead: &LeadRecord) -> anyhow::Result<()> {
        let email = self.message(lead)?;
        self.transport
            .send(&email)
            .context("failed to send lead notification")?;
        Ok(())
    }
}
