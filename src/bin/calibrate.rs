//! Calibration runner: baseline CSV in, frozen thresholds artifact out.
//!
//! Usage: calibrate <baseline.csv> [out.json]
//! Knobs via env: SEED, PRICE_COL, N_BOOTSTRAP, SAMPLE_SIZE, N_BINS.

use anyhow::{Context, Result};
use driftgate::calibration::calibrate;
use driftgate::data::load_csv_column;
use driftgate::estimator::EstimatorConfig;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    let input = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: calibrate <baseline.csv> [out.json]");
            std::process::exit(2);
        }
    };
    let out = env::args()
        .nth(2)
        .unwrap_or_else(|| "config/frozen_thresholds.json".to_string());

    let cfg = EstimatorConfig {
        seed: env_parse("SEED", 42),
        column: env::var("PRICE_COL").unwrap_or_else(|_| "price".to_string()),
        n_bootstrap: env_parse("N_BOOTSTRAP", 200),
        sample_size: env::var("SAMPLE_SIZE").ok().and_then(|v| v.parse().ok()),
        n_bins: env_parse("N_BINS", 128),
        bandwidth: env::var("BANDWIDTH").ok().and_then(|v| v.parse().ok()),
        log_transform: true,
    };

    let frame = load_csv_column(&input, &cfg.column)
        .with_context(|| format!("loading {}", input.display()))?;
    let artifact = calibrate(&frame, &cfg).context("calibration failed")?;
    artifact
        .write(PathBuf::from(&out).as_path())
        .with_context(|| format!("writing {}", out))?;

    println!("wrote {}", out);
    println!(
        "seed={} sample_size={} p95={:.6} p99={:.6}",
        artifact.seed, artifact.sample_size, artifact.percentiles.p95, artifact.percentiles.p99
    );
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
