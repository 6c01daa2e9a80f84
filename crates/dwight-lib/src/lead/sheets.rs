use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use serde::Serialize;

use super::{LeadRecord, LeadSink};

/// Query context longer than this is cut before it reaches the sheet.
const MAX_SHEET_CONTEXT_CHARS: usize = 500;

/// Appends one row per lead through a spreadsheet-append webhook.
///
/// The webhook receives `{"sheet": "Leads", "row": [...]}` with columns
/// timestamp, name, email, phone, query context, session id, status.
pub struct SheetsSink {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct AppendRow<'a> {
    sheet: &'static str,
    row: [&'a str; 7],
}

impl SheetsSink {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!url.trim().is_empty(), "empty spreadsheet webhook URL");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build spreadsheet HTTP client")?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(cut, _)| &text[..cut])
}

fn append_row(lead: &LeadRecord) -> AppendRow<'_> {
    AppendRow {
        sheet: "Leads",
        row: [
            lead.timestamp.as_str(),
            lead.name.as_str(),
            lead.email.as_str(),
            lead.phone.as_str(),
            truncate_chars(&lead.query_context, MAX_SHEET_CONTEXT_CHARS),
            lead.session_id.as_str(),
            lead.status.as_str(),
        ],
    }
}

impl LeadSink for SheetsSink {
    fn name(&self) -> &'static str {
        "sheets"
    }

    fn deliver(&self, lead: &LeadRecord) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&append_row(lead))
            .send()
            .context("failed to call spreadsheet webhook")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("spreadsheet webhook returned {status}: {text}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(context: String) -> LeadRecord {
        LeadRecord {
            timestamp: "2026-03-01T10:00:00Z".to_string(),
            name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            phone: "+91 98".to_string(),
            query_context: context,
            session_id: "web-7".to_string(),
            status: "New".to_string(),
        }
    }

    #[test]
    fn row_columns_in_sheet_order() {
        let record = lead("rates to Dubai".to_string());
        let value = serde_json::to_value(append_row(&record)).unwrap();
        assert_eq!(value["sheet"], "Leads");
        assert_eq!(
            value["row"],
            serde_json::json!([
                "2026-03-01T10:00:00Z",
                "Ravi",
                "ravi@example.com",
                "+91 98",
                "rates to Dubai",
                "web-7",
                "New"
            ])
        );
    }

    #[test]
    fn long_context_is_truncated() {
        let record = lead("ü".repeat(MAX_SHEET_CONTEXT_CHARS + 20));
        let row = append_row(&record);
        assert_eq!(row.row[4].chars().count(), MAX_SHEET_CONTEXT_CHARS);
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(SheetsSink::new("  ", Duration::from_secs(1)).is_err());
    }
}
