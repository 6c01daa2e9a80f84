pub mod local;
pub mod sheets;
pub mod smtp;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LeadConfig;
use local::LocalFileSink;
use sheets::SheetsSink;
use smtp::SmtpSink;

/// Status recorded on every newly captured lead.
pub const NEW_LEAD_STATUS: &str = "New";

/// Contact details as submitted by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeadSubmission {
    pub email: String,
    pub phone: String,
    pub name: Option<String>,
    /// The message that prompted the lead capture.
    pub query_context: Option<String>,
    pub session_id: Option<String>,
}

/// A lead as stored by every sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// ISO-8601 capture time (UTC).
    pub timestamp: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub query_context: String,
    pub session_id: String,
    pub status: String,
}

impl LeadRecord {
    pub fn new(submission: LeadSubmission, captured_at: jiff::Timestamp) -> Self {
        Self {
            timestamp: captured_at.to_string(),
            name: submission.name.unwrap_or_default(),
            email: submission.email,
            phone: submission.phone,
            query_context: submission.query_context.unwrap_or_default(),
            session_id: submission.session_id.unwrap_or_default(),
            status: NEW_LEAD_STATUS.to_string(),
        }
    }
}

/// Email shortened to its first three characters for logging.
pub fn redact_email(email: &str) -> String {
    let prefix: String = email.chars().take(3).collect();
    format!("{prefix}***")
}

/// A destination that accepts captured leads.
pub trait LeadSink: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn deliver(&self, lead: &LeadRecord) -> anyhow::Result<()>;
}

/// Fans a lead out to every configured remote sink, falling back to the
/// local backup file when none of them accepted it.
pub struct LeadDesk {
    remote: Vec<Box<dyn LeadSink>>,
    fallback: LocalFileSink,
}

impl LeadDesk {
    pub fn new(fallback: LocalFileSink) -> Self {
        Self {
            remote: Vec::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn LeadSink>) -> Self {
        self.remote.push(sink);
        self
    }

    /// Build the desk from configuration. Sinks without settings are left out.
    pub fn from_config(config: &LeadConfig, timeout: Duration) -> anyhow::Result<Self> {
        let mut desk = Self::new(LocalFileSink::new(&config.backup_file));
        if let Some(url) = &config.sheets_webhook_url {
            desk = desk.with_sink(Box::new(SheetsSink::new(url, timeout)?));
        }
        if let Some(smtp) = &config.smtp {
            desk = desk.with_sink(Box::new(SmtpSink::new(smtp, timeout)?));
        }
        Ok(desk)
    }

    /// Names of the configured remote sinks, in delivery order.
    pub fn remote_sinks(&self) -> Vec<&'static str> {
        self.remote.iter().map(|s| s.name()).collect()
    }

    /// Deliver a lead to every remote sink; when all of them fail (or none is
    /// configured) write it to the local backup instead.
    ///
    /// Returns the names of the sinks that accepted the lead. Fails only when
    /// the local fallback fails too.
    pub fn capture(&self, submission: LeadSubmission) -> anyhow::Result<Vec<&'static str>> {
        let lead = LeadRecord::new(submission, jiff::Timestamp::now());
        info!(
            email = %redact_email(&lead.email),
            has_phone = !lead.phone.is_empty(),
            has_name = !lead.name.is_empty(),
            session_id = %lead.session_id,
            "Lead captured"
        );

        let mut accepted = Vec::new();
        for sink in &self.remote {
            match sink.deliver(&lead) {
                Ok(()) => {
                    info!(sink = sink.name(), "Lead delivered");
                    accepted.push(sink.name());
                }
                Err(e) => warn!(sink = sink.name(), error = %format!("{e:#}"), "Lead delivery failed"),
            }
        }
        if !accepted.is_empty() {
            return Ok(accepted);
        }

        self.fallback.deliver(&lead)?;
        info!(file = %self.fallback.path().display(), "Lead stored in local backup");
        Ok(vec![self.fallback.name()])
    }
}
