//! Structured logging for the gating pipeline.
//!
//! One JSON object per line on stdout: level, domain, event, monotonic
//! sequence number, RFC3339 millisecond timestamp. Key-material and signature
//! fields are redacted before emission.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Levels and domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Estimator,
    Gate,
    Signer,
    Audit,
    Calibration,
    System,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Estimator => "estimator",
            Domain::Gate => "gate",
            Domain::Signer => "signer",
            Domain::Audit => "audit",
            Domain::Calibration => "calibration",
            Domain::System => "system",
        }
    }

    fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Emission
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// RFC3339 timestamp with milliseconds.
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["signature", "private_key", "api_key"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

/// Emit a structured log entry, subject to LOG_LEVEL / LOG_DOMAINS.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let fields = sanitize_fields(fields);

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert(
        "seq".to_string(),
        json!(LOG_SEQ.fetch_add(1, Ordering::SeqCst)),
    );
    entry.insert("lvl".to_string(), json!(level.as_str()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("data".to_string(), Value::Object(fields));

    println!("{}", Value::Object(entry));
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_decision(action_type: &str, action: &str, jsd_global: f64) {
    log(
        Level::Info,
        Domain::Gate,
        "decision",
        obj(&[
            ("action_type", json!(action_type)),
            ("action", json!(action)),
            ("jsd_global", json!(jsd_global)),
        ]),
    );
}

pub fn log_audit_append(path: &Path, bytes: usize) {
    log(
        Level::Debug,
        Domain::Audit,
        "append",
        obj(&[
            ("path", json!(path.display().to_string())),
            ("bytes", json!(bytes)),
        ]),
    );
}

pub fn log_calibration(seed: u64, sample_size: usize, p95: f64, p99: f64) {
    log(
        Level::Info,
        Domain::Calibration,
        "calibrated",
        obj(&[
            ("seed", json!(seed)),
            ("sample_size", json!(sample_size)),
            ("p95", json!(p95)),
            ("p99", json!(p99)),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_signature_fields_are_redacted() {
        let fields = sanitize_fields(obj(&[
            ("signature", json!("deadbeef")),
            ("action", json!("OPEN")),
        ]));
        assert_eq!(fields.get("signature").unwrap(), "[REDACTED]");
        assert_eq!(fields.get("action").unwrap(), "OPEN");
    }

    #[test]
    fn test_seq_increments() {
        let a = LOG_SEQ.fetch_add(1, Ordering::SeqCst);
        let b = LOG_SEQ.fetch_add(1, Ordering::SeqCst);
        assert!(b > a);
    }
}
