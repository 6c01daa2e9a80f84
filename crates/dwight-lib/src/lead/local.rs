use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing::warn;

use super::{LeadRecord, LeadSink};

/// Appends leads to a JSON array file. Last line of defense: used when no
/// remote sink accepted a lead.
pub struct LocalFileSink {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn existing_leads(&self) -> anyhow::Result<Vec<LeadRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        match serde_json::from_str(&raw) {
            Ok(leads) => Ok(leads),
            Err(e) => {
                // Keep the unreadable file around instead of overwriting it.
                let aside = self.path.with_extension("json.corrupt");
                warn!(
                    file = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Lead backup is not a JSON array, starting a new one"
                );
                fs::rename(&self.path, &aside)
                    .with_context(|| format!("Failed to move aside {}", self.path.display()))?;
                Ok(Vec::new())
            }
        }
    }
}

impl LeadSink for LocalFileSink {
    fn name(&self) -> &'static str {
        "local"
    }

    fn deliver(&self, lead: &LeadRecord) -> anyhow::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Lead backup lock poisoned"))?;

        let mut leads = self.existing_leads()?;
        leads.push(lead.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&leads).context("Failed to serialize leads")?;
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::NEW_LEAD_STATUS;

    fn lead(email: &str) -> LeadRecord {
        LeadRecord {
            timestamp: "2026-03-01T10:00:00Z".to_string(),
            name: String::new(),
            email: email.to_string(),
            phone: "555".to_string(),
            query_context: String::new(),
            session_id: "s-1".to_string(),
            status: NEW_LEAD_STATUS.to_string(),
        }
    }

    fn read(path: &Path) -> Vec<LeadRecord> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn appends_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("leads_backup.json");
        let sink = LocalFileSink::new(&path);
        sink.deliver(&lead("a@x.io")).unwrap();
        sink.deliver(&lead("b@x.io")).unwrap();

        let leads = read(&path);
        assert_eq!(
            leads.iter().map(|l| l.email.as_str()).collect::<Vec<_>>(),
            vec!["a@x.io", "b@x.io"]
        );
    }

    #[test]
    fn corrupt_backup_is_moved_aside() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("leads_backup.json");
        fs::write(&path, "{not json").unwrap();

        LocalFileSink::new(&path).deliver(&lead("c@x.io")).unwrap();
        assert_eq!(read(&path).len(), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("leads_backup.json.corrupt")).unwrap(),
            "{not json"
        );
    }

    #[test]
    fn written_file_uses_record_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("leads_backup.json");
        LocalFileSink::new(&path).deliver(&lead("d@x.io")).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["status"], "New");
        assert_eq!(value[0]["session_id"], "s-1");
        assert_eq!(value[0]["query_context"], "");
    }
}
