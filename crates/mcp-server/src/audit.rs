//! Append-only audit log. One JSON line per request, flushed after each
//! record. Events never carry file contents, secrets, or raw prompt
//! text; the bundler logs only the prompt fingerprint.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AUDIT_FILE_NAME: &str = "audit.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub timestamp: u64,
    pub request_id: Value,
    pub tool: String,
    pub ok: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub metadata: Value,
}

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(AUDIT_FILE_NAME),
        }
    }

    pub fn append(&self, event: &AuditEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }

    /// Events with `timestamp >= since`, chronological, truncated from
    /// the front so the most recent `limit` remain.
    pub fn read_events(&self, since: Option<u64>, limit: usize) -> std::io::Result<Vec<AuditEvent>> {
        if !self.path.exists() || limit == 0 {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events: Vec<AuditEvent> = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(trimmed) {
                Ok(event) => {
                    if since.map_or(true, |cutoff| event.timestamp >= cutoff) {
                        events.push(event);
                    }
                }
                Err(e) => log::warn!("skipping corrupt audit row: {e}"),
            }
        }
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }
}
