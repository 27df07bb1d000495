//! Drift estimator: bootstrap distribution of bounded Jensen-Shannon
//! divergence between a frozen baseline and seeded resamples of it.
//!
//! ## Design principles
//!
//! 1. Deterministic: all randomness flows through one `StdRng` owned by the
//!    call. Same baseline, seed, and knobs reproduce byte-identical output.
//! 2. Bounded: every emitted score lies in [0, 1]; numeric failure inside a
//!    single iteration is absorbed as the conservative worst case 1.0.
//! 3. The density strategy (point mass, KDE, histogram) is selected before
//!    computation, never recovered from after a failed attempt.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::SampleFrame;
use crate::errors::GateError;

/// Floor applied to every PMF entry so KL terms stay finite.
const EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Deterministic RNG seed.
    pub seed: u64,
    /// Frame column holding the sample values.
    pub column: String,
    /// Number of bootstrap resamples.
    pub n_bootstrap: usize,
    /// Rows per bootstrap draw; defaults to the baseline length.
    pub sample_size: Option<usize>,
    /// Histogram bin count (also the KDE evaluation grid size).
    pub n_bins: usize,
    /// KDE bandwidth factor; Scott's rule when absent.
    pub bandwidth: Option<f64>,
    /// Apply `ln(1+x)` to compress heavy tails.
    pub log_transform: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            column: "price".to_string(),
            n_bootstrap: 200,
            sample_size: None,
            n_bins: 128,
            bandwidth: None,
            log_transform: true,
        }
    }
}

/// Percentile with linear interpolation over a sorted slice, q in [0, 100].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Monotonically increasing equal-width bin edges, fixed for the lifetime of
/// one estimator invocation.
#[derive(Debug, Clone)]
pub struct BinGrid {
    edges: Vec<f64>,
}

impl BinGrid {
    /// Derive edges from robust 0.5/99.5 percentile bounds of the baseline,
    /// padded by 10% of the span (min/max fallback when degenerate).
    fn from_baseline(values: &[f64], n_bins: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut lo = percentile(&sorted, 0.5);
        let mut hi = percentile(&sorted, 99.5);
        if hi <= lo {
            lo = sorted[0];
            hi = sorted[sorted.len() - 1];
        }
        let pad = (1e-6f64).max((hi - lo) * 0.1);
        let (start, end) = (lo - pad, hi + pad);

        let step = (end - start) / n_bins as f64;
        let edges = (0..=n_bins).map(|i| start + step * i as f64).collect();
        Self { edges }
    }

    fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    fn lo(&self) -> f64 {
        self.edges[0]
    }

    fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    fn width(&self) -> f64 {
        (self.hi() - self.lo()) / self.n_bins() as f64
    }

    fn centers(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect()
    }

    /// Bin containing `value`, clamped to the grid.
    fn bin_index(&self, value: f64) -> usize {
        let raw = ((value - self.lo()) / self.width()).floor();
        (raw.max(0.0) as usize).min(self.n_bins() - 1)
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.lo() && value <= self.hi()
    }
}

/// Density strategy, decided from the sample before any PMF is computed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PmfMethod {
    /// Empty sample: no evidence, uniform mass.
    Uniform,
    /// All values identical: full mass in the containing bin.
    PointMass(f64),
    /// Gaussian KDE evaluated at bin centers.
    Kde { bandwidth: f64 },
    /// Deterministic histogram mass per bin.
    Histogram,
}

fn select_method(samples: &[f64], bw_hint: Option<f64>) -> PmfMethod {
    if samples.is_empty() {
        return PmfMethod::Uniform;
    }
    let first = samples[0];
    if samples.iter().all(|&v| v == first) {
        return PmfMethod::PointMass(first);
    }
    let sigma = sample_std(samples);
    let factor = bw_hint.unwrap_or_else(|| (samples.len() as f64).powf(-0.2));
    let bandwidth = factor * sigma;
    if bandwidth.is_finite() && bandwidth > 0.0 {
        PmfMethod::Kde { bandwidth }
    } else {
        PmfMethod::Histogram
    }
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Floor every entry and renormalize to sum 1. An all-zero (or non-finite)
/// vector degrades to uniform.
fn safe_normalize(mut pmf: Vec<f64>) -> Vec<f64> {
    for v in &mut pmf {
        *v += EPS;
    }
    let sum: f64 = pmf.iter().sum();
    if !(sum > 0.0) || !sum.is_finite() {
        let uniform = 1.0 / pmf.len() as f64;
        return vec![uniform; pmf.len()];
    }
    for v in &mut pmf {
        *v /= sum;
    }
    pmf
}

fn build_pmf(grid: &BinGrid, samples: &[f64], bw_hint: Option<f64>) -> Vec<f64> {
    match select_method(samples, bw_hint) {
        PmfMethod::Uniform => safe_normalize(vec![1.0; grid.n_bins()]),
        PmfMethod::PointMass(value) => {
            let mut pmf = vec![0.0; grid.n_bins()];
            pmf[grid.bin_index(value)] = 1.0;
            safe_normalize(pmf)
        }
        PmfMethod::Kde { bandwidth } => {
            // Constant kernel factors cancel under normalization.
            let pmf: Vec<f64> = grid
                .centers()
                .iter()
                .map(|&c| {
                    samples
                        .iter()
                        .map(|&x| {
                            let z = (c - x) / bandwidth;
                            (-0.5 * z * z).exp()
                        })
                        .sum::<f64>()
                })
                .collect();
            safe_normalize(pmf)
        }
        PmfMethod::Histogram => {
            let mut pmf = vec![0.0; grid.n_bins()];
            for &v in samples {
                if grid.contains(v) {
                    pmf[grid.bin_index(v)] += 1.0;
                }
            }
            safe_normalize(pmf)
        }
    }
}

/// KL(p || q) in bits; both inputs are epsilon-floored PMFs.
fn kl_div(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .map(|(&pi, &qi)| pi * (pi / qi).log2())
        .sum()
}

/// Jensen-Shannon divergence of two PMFs. Base-2 KL bounds the raw value by
/// log2(2) = 1, so the result is already normalized to [0, 1].
fn jsd_from_pmfs(p: &[f64], q: &[f64]) -> f64 {
    let p = safe_normalize(p.to_vec());
    let q = safe_normalize(q.to_vec());
    let m: Vec<f64> = p.iter().zip(&q).map(|(&a, &b)| 0.5 * (a + b)).collect();
    0.5 * kl_div(&p, &m) + 0.5 * kl_div(&q, &m)
}

/// Compute the bootstrap JSD distribution for one column of `frame`.
///
/// Returns exactly `n_bootstrap` values in [0, 1]. An empty baseline (after
/// dropping non-finite values) yields all zeros: no data, zero measured risk.
pub fn compute_jsd_distribution(
    frame: &SampleFrame,
    cfg: &EstimatorConfig,
) -> Result<Vec<f64>, GateError> {
    let raw = frame.column(&cfg.column)?;

    let values: Vec<f64> = raw
        .iter()
        .copied()
        .map(|v| if cfg.log_transform { v.ln_1p() } else { v })
        .filter(|v| v.is_finite())
        .collect();

    if values.is_empty() {
        return Ok(vec![0.0; cfg.n_bootstrap]);
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let draw_size = cfg.sample_size.unwrap_or(values.len());

    let grid = BinGrid::from_baseline(&values, cfg.n_bins);
    let baseline_pmf = build_pmf(&grid, &values, cfg.bandwidth);

    let mut out = Vec::with_capacity(cfg.n_bootstrap);
    for _ in 0..cfg.n_bootstrap {
        let sample: Vec<f64> = (0..draw_size)
            .map(|_| values[rng.gen_range(0..values.len())])
            .collect();
        let sample_pmf = build_pmf(&grid, &sample, cfg.bandwidth);
        let mut jsd = jsd_from_pmfs(&baseline_pmf, &sample_pmf);
        if !jsd.is_finite() {
            // Record maximal distance rather than aborting the batch.
            jsd = 1.0;
        }
        out.push(jsd.clamp(0.0, 1.0));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_frame(values: Vec<f64>) -> SampleFrame {
        SampleFrame::from_column("price", values)
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_grid_edges_monotone() {
        let grid = BinGrid::from_baseline(&[1.0, 2.0, 3.0, 10.0], 16);
        assert_eq!(grid.edges.len(), 17);
        assert!(grid.edges.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_pmf_sums_to_one_and_has_no_zeros() {
        let grid = BinGrid::from_baseline(&[1.0, 2.0, 3.0], 32);
        for samples in [vec![], vec![2.0; 10], vec![1.0, 1.5, 2.0, 2.5, 3.0]] {
            let pmf = build_pmf(&grid, &samples, None);
            let sum: f64 = pmf.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum={}", sum);
            assert!(pmf.iter().all(|&v| v > 0.0));
        }
    }

    #[test]
    fn test_jsd_identical_pmfs_is_zero() {
        let grid = BinGrid::from_baseline(&[1.0, 2.0, 3.0, 4.0], 32);
        let p = build_pmf(&grid, &[1.0, 2.0, 3.0, 4.0], None);
        let jsd = jsd_from_pmfs(&p, &p);
        assert!(jsd.abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_pmfs_near_max() {
        let mut p = vec![0.0; 8];
        let mut q = vec![0.0; 8];
        p[0] = 1.0;
        q[7] = 1.0;
        let jsd = jsd_from_pmfs(&p, &q);
        assert!(jsd > 0.99 && jsd <= 1.0, "jsd={}", jsd);
    }

    #[test]
    fn test_seed_determinism() {
        let frame = price_frame((0..100).map(|i| 10.0 + (i % 7) as f64).collect());
        let cfg = EstimatorConfig {
            seed: 123,
            n_bootstrap: 20,
            n_bins: 64,
            ..Default::default()
        };
        let a = compute_jsd_distribution(&frame, &cfg).unwrap();
        let b = compute_jsd_distribution(&frame, &cfg).unwrap();
        assert_eq!(a, b);
        assert_ne!(
            a,
            compute_jsd_distribution(&frame, &EstimatorConfig { seed: 124, ..cfg }).unwrap()
        );
    }

    #[test]
    fn test_empty_baseline_yields_zeros() {
        let frame = price_frame(vec![]);
        let cfg = EstimatorConfig {
            seed: 0,
            n_bootstrap: 5,
            ..Default::default()
        };
        assert_eq!(
            compute_jsd_distribution(&frame, &cfg).unwrap(),
            vec![0.0; 5]
        );
    }

    #[test]
    fn test_nan_only_column_counts_as_empty() {
        let frame = price_frame(vec![f64::NAN, f64::NAN]);
        let cfg = EstimatorConfig {
            n_bootstrap: 3,
            ..Default::default()
        };
        assert_eq!(
            compute_jsd_distribution(&frame, &cfg).unwrap(),
            vec![0.0; 3]
        );
    }

    #[test]
    fn test_singleton_and_constant_baselines_stay_in_range() {
        for values in [vec![42.0], vec![42.0; 10]] {
            let frame = price_frame(values);
            let cfg = EstimatorConfig {
                seed: 0,
                n_bootstrap: 5,
                sample_size: Some(5),
                ..Default::default()
            };
            let out = compute_jsd_distribution(&frame, &cfg).unwrap();
            assert_eq!(out.len(), 5);
            assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_missing_column_is_validation_error() {
        let frame = price_frame(vec![1.0]);
        let cfg = EstimatorConfig {
            column: "quantity".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            compute_jsd_distribution(&frame, &cfg),
            Err(GateError::Validation(_))
        ));
    }

    #[test]
    fn test_bandwidth_hint_changes_but_keeps_range() {
        let frame = price_frame((0..200).map(|i| 10.0 + (i % 13) as f64 * 0.5).collect());
        let cfg = EstimatorConfig {
            n_bootstrap: 10,
            bandwidth: Some(0.5),
            ..Default::default()
        };
        let out = compute_jsd_distribution(&frame, &cfg).unwrap();
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
