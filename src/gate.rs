//! Decision gate: maps a drift diagnostic to an action tier and wraps every
//! governed action in a signed, durably persisted receipt.
//!
//! `decide` is pure and touches no shared state; `GateController::execute`
//! never returns a decision without a verifiable receipt already on disk.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::audit::AuditLog;
use crate::errors::GateError;
use crate::logging;
use crate::signer::ReceiptSigner;

/// Absent thresholds default to this, disabling the tier. Finite so a
/// `Thresholds` value always survives a JSON round trip.
pub const DISABLED_THRESHOLD: f64 = 1e9;

/// Action tier for a governed pricing action, least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionTier {
    /// Proceed normally.
    Open,
    /// Proceed with reduced scope/rate.
    Throttle,
    /// Block the action entirely.
    HardLock,
}

impl ActionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTier::Open => "OPEN",
            ActionTier::Throttle => "THROTTLE",
            ActionTier::HardLock => "HARD_LOCK",
        }
    }
}

/// Calibrated percentile thresholds consumed by `decide`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "disabled")]
    pub jsd_global_95: f64,
    #[serde(default = "disabled")]
    pub jsd_global_99: f64,
}

fn disabled() -> f64 {
    DISABLED_THRESHOLD
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            jsd_global_95: DISABLED_THRESHOLD,
            jsd_global_99: DISABLED_THRESHOLD,
        }
    }
}

/// Diagnostic name → value. Missing diagnostics read as 0.0.
pub type DiagnosticContext = BTreeMap<String, f64>;

/// Pure tier decision. Boundaries are inclusive (`>=`), so a threshold of
/// exactly 0.0 forces HARD_LOCK unconditionally — an explicit kill switch.
pub fn decide(diagnostics: &DiagnosticContext, thresholds: &Thresholds) -> ActionTier {
    let jsd = diagnostics.get("jsd_global").copied().unwrap_or(0.0);
    if jsd >= thresholds.jsd_global_99 {
        ActionTier::HardLock
    } else if jsd >= thresholds.jsd_global_95 {
        ActionTier::Throttle
    } else {
        ActionTier::Open
    }
}

/// Canonical decision payload; these exact bytes are signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptPayload {
    pub timestamp: String,
    pub action_type: String,
    pub payload: Value,
    pub action: ActionTier,
    pub diagnostics: DiagnosticContext,
}

/// Signed attestation binding a decision to its inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub payload: ReceiptPayload,
    pub signature: String,
}

/// What the caller of a governed action gets back.
#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    pub action: ActionTier,
    pub diagnostics: DiagnosticContext,
    pub receipt: Receipt,
}

/// Enforcement wrapper around `decide` + signing + durable audit append.
pub struct GateController {
    signer: ReceiptSigner,
    audit: AuditLog,
    thresholds: Thresholds,
}

impl GateController {
    pub fn new(signer: ReceiptSigner, audit: AuditLog, thresholds: Thresholds) -> Self {
        Self {
            signer,
            audit,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Execute a governed action.
    ///
    /// Signing or append failure is fatal to the whole call: the decision is
    /// only returned once its receipt is verifiable and on stable storage.
    pub fn execute(
        &self,
        action_type: &str,
        payload: Value,
        context: &DiagnosticContext,
    ) -> Result<GateDecision, GateError> {
        let mut diagnostics = DiagnosticContext::new();
        diagnostics.insert(
            "jsd_global".to_string(),
            context.get("jsd_global").copied().unwrap_or(0.0),
        );

        let action = decide(&diagnostics, &self.thresholds);

        let receipt_payload = ReceiptPayload {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            action_type: action_type.to_string(),
            payload,
            action,
            diagnostics: diagnostics.clone(),
        };
        let signature = self.signer.sign(&receipt_payload)?;
        let receipt = Receipt {
            payload: receipt_payload,
            signature,
        };

        self.audit.append(&receipt)?;
        logging::log_decision(
            action_type,
            action.as_str(),
            diagnostics.get("jsd_global").copied().unwrap_or(0.0),
        );

        Ok(GateDecision {
            action,
            diagnostics,
            receipt,
        })
    }
}
