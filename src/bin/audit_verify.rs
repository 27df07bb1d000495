//! Re-verify every receipt in an audit log against the configured public key.
//!
//! Any post-hoc edit of a persisted record changes its canonical bytes and
//! breaks the signature, so a non-zero exit here means tampering (or a torn
//! record that should have been skipped by the writer's crash recovery).
//!
//! Usage: audit_verify <decisions.log>   (DEV_PUBLIC_KEY_PATH must be set)

use anyhow::{bail, Result};
use driftgate::audit::AuditLog;
use driftgate::signer::ReceiptSigner;
use std::env;

fn main() -> Result<()> {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: audit_verify <decisions.log>");
            std::process::exit(2);
        }
    };

    let signer = ReceiptSigner::from_env()?;
    if !signer.can_verify() {
        bail!("no public key loaded; set DEV_PUBLIC_KEY_PATH");
    }

    let records = AuditLog::new(&path).read_all()?;
    let mut ok = 0usize;
    let mut failed = 0usize;

    for (idx, record) in records.iter().enumerate() {
        let payload = record.get("payload");
        let signature = record.get("signature").and_then(|s| s.as_str());
        let valid = match (payload, signature) {
            (Some(payload), Some(signature)) => signer.verify(payload, signature)?,
            _ => false,
        };
        if valid {
            ok += 1;
        } else {
            failed += 1;
            eprintln!("record {} failed verification", idx);
        }
    }

    println!("{}: {} verified, {} failed", path, ok, failed);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
