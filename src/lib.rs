//! driftgate: drift-gated pricing actions with a signed audit trail.
//!
//! Pipeline: a frozen baseline is calibrated offline into JSD percentile
//! thresholds; each governed action is scored against those thresholds,
//! signed over canonical bytes, and durably appended to an append-only audit
//! log before the caller sees the decision.

pub mod audit;
pub mod calibration;
pub mod canonical;
pub mod data;
pub mod errors;
pub mod estimator;
pub mod gate;
pub mod logging;
pub mod signer;

pub use audit::AuditLog;
pub use calibration::{calibrate, CalibrationArtifact};
pub use canonical::canonical_bytes;
pub use data::SampleFrame;
pub use errors::GateError;
pub use estimator::{compute_jsd_distribution, EstimatorConfig};
pub use gate::{decide, ActionTier, DiagnosticContext, GateController, Receipt, Thresholds};
pub use signer::ReceiptSigner;
