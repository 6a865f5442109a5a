//! File-backed audit log, one JSON event per line.
//!
//! Appends are fsynced before returning, satisfying the
//! durable-before-return contract of [`AuditLog`].

use crate::audit::event::AuditEvent;
use crate::audit::log::AuditLog;
use crate::core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only JSON-lines audit log.
pub struct JsonlAuditLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Open (or create) the log file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back, in append order (for reconstruction).
    pub fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }
}

impl AuditLog for JsonlAuditLog {
    fn append(&self, event: AuditEvent) -> Result<()> {
        let line =
            serde_json::to_string(&event).map_err(|e| Error::AuditAppend(e.to_string()))?;

        let mut file = self.file.lock().expect("audit file lock poisoned");
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|e| Error::AuditAppend(e.to_string()))
    }
}
