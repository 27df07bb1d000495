//! Offline calibration: turn a frozen baseline into gate thresholds.
//!
//! Runs the estimator over the baseline and records the 95th/99th percentile
//! of the bootstrap JSD distribution in a reproducible artifact. The gate
//! consumes the artifact; it never recalibrates online.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::data::SampleFrame;
use crate::errors::GateError;
use crate::estimator::{compute_jsd_distribution, percentile, EstimatorConfig};
use crate::gate::Thresholds;
use crate::logging;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Percentiles {
    #[serde(rename = "95")]
    pub p95: f64,
    #[serde(rename = "99")]
    pub p99: f64,
}

/// Frozen calibration output. Everything needed to reproduce the run plus the
/// thresholds the gate will enforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    pub seed: u64,
    pub sample_size: usize,
    pub percentiles: Percentiles,
    pub calibration_timestamp_utc: String,
}

impl CalibrationArtifact {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            jsd_global_95: self.percentiles.p95,
            jsd_global_99: self.percentiles.p99,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), GateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, GateError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Run the estimator over `frame` and distill the threshold percentiles.
///
/// Percentiles come from the full bootstrap distribution; held-out
/// calibration, if wanted, belongs to the orchestrator that prepares `frame`.
pub fn calibrate(frame: &SampleFrame, cfg: &EstimatorConfig) -> Result<CalibrationArtifact, GateError> {
    let jsd_vals = compute_jsd_distribution(frame, cfg)?;
    let mut sorted = jsd_vals;
    sorted.sort_by(f64::total_cmp);

    let artifact = CalibrationArtifact {
        seed: cfg.seed,
        sample_size: frame.rows(),
        percentiles: Percentiles {
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        },
        calibration_timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    logging::log_calibration(
        artifact.seed,
        artifact.sample_size,
        artifact.percentiles.p95,
        artifact.percentiles.p99,
    );
    Ok(artifact)
}
