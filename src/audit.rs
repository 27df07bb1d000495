//! Append-only audit log of signed receipts.
//!
//! One canonical JSON record per line. Each append holds an exclusive
//! OS-level lock on the log file for exactly one write+fsync, serializing
//! concurrent writers without spanning the whole decision pipeline. Records
//! are never rewritten or deleted; line order is the total write order.

use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::canonical::canonical_bytes;
use crate::errors::GateError;
use crate::logging;

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one receipt.
    ///
    /// Canonical bytes plus a newline delimiter, written under an exclusive
    /// flock and fsynced before the lock is released. When this returns Ok,
    /// a fresh read (even from another process) observes the record.
    pub fn append<T: Serialize>(&self, receipt: &T) -> Result<(), GateError> {
        let bytes = canonical_bytes(receipt)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let write = (|| {
            file.write_all(&bytes)?;
            file.write_all(b"\n")?;
            file.flush()?;
            file.sync_all()
        })();
        let unlock = FileExt::unlock(&file);
        write?;
        unlock?;

        logging::log_audit_append(&self.path, bytes.len());
        Ok(())
    }

    /// All well-formed records in write order.
    ///
    /// A malformed line (a torn record from a crash mid-write) is skipped
    /// rather than failing the whole read. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<Value>, GateError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(record) => records.push(record),
                Err(_) => continue,
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("decisions.log"));

        for i in 0..3 {
            log.append(&json!({"seq": i, "action": "OPEN"})).unwrap();
        }

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["seq"], 0);
        assert_eq!(records[2]["seq"], 2);
    }

    #[test]
    fn test_records_are_canonical_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let log = AuditLog::new(&path);
        log.append(&json!({"b": 2, "a": 1})).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "{\"a\":1,\"b\":2}\n");
    }

    #[test]
    fn test_torn_tail_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let log = AuditLog::new(&path);
        log.append(&json!({"seq": 0})).unwrap();

        // Simulate a crash mid-write: partial record, no closing brace.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":1,\"act").unwrap();
        drop(file);

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["seq"], 0);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("absent.log"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_fresh_handle_sees_appended_record() {
        // A second AuditLog over the same path stands in for a new process.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");

        AuditLog::new(&path).append(&json!({"seq": 42})).unwrap();

        let records = AuditLog::new(&path).read_all().unwrap();
        assert_eq!(records.last().unwrap()["seq"], 42);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit").join("decisions.log"));
        log.append(&json!({"seq": 0})).unwrap();
        assert_eq!(log.read_all().unwrap().len(), 1);
    }
}
