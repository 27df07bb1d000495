//! Error taxonomy for the gating pipeline.
//!
//! Numeric degeneracy inside a bootstrap iteration is never surfaced here; the
//! estimator absorbs it as a conservative worst-case score.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// Key material is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input: ragged frame, missing column, unparsable artifact.
    #[error("validation error: {0}")]
    Validation(String),

    /// Frozen baseline no longer matches its manifest. Fail closed.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
