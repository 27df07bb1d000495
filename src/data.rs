//! Baseline sample handling: columnar frames, CSV loading, and integrity
//! verification against a frozen manifest.
//!
//! Manifest *creation* (the baseline freezer) lives outside this crate; the
//! core only verifies that a sample file still matches the manifest it was
//! frozen with, and fails closed on any mismatch.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::errors::GateError;

/// Named numeric columns of equal length. Cells that failed to parse are
/// carried as NaN and dropped by the estimator.
#[derive(Debug, Clone, Default)]
pub struct SampleFrame {
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl SampleFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-column frame.
    pub fn from_column(name: &str, values: Vec<f64>) -> Self {
        let rows = values.len();
        let mut columns = BTreeMap::new();
        columns.insert(name.to_string(), values);
        Self { columns, rows }
    }

    /// Add a column; every column must have the same length.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), GateError> {
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(GateError::Validation(format!(
                "ragged column '{}': {} rows, frame has {}",
                name,
                values.len(),
                self.rows
            )));
        }
        self.rows = values.len();
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Fetch a column or fail with the list of available columns.
    pub fn column(&self, name: &str) -> Result<&[f64], GateError> {
        self.columns.get(name).map(Vec::as_slice).ok_or_else(|| {
            GateError::Validation(format!(
                "column '{}' not found (cols: {:?})",
                name,
                self.columns.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Chunked SHA-256 of a file, hex-encoded.
pub fn file_sha256(path: &Path) -> Result<String, GateError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Summary statistics recorded when a baseline was frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStats {
    pub rows: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Integrity manifest of a frozen baseline file. Produced externally; this
/// crate only consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineManifest {
    pub hash_sha256: String,
    pub size_bytes: u64,
    pub stats: BaselineStats,
}

impl BaselineManifest {
    pub fn read(path: &Path) -> Result<Self, GateError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Verify a baseline file against its frozen manifest. Any mismatch is an
/// `Integrity` error; callers must not hand the sample to the estimator after
/// a failure here.
pub fn verify_manifest(csv_path: &Path, manifest: &BaselineManifest) -> Result<(), GateError> {
    let size = std::fs::metadata(csv_path)?.len();
    if size != manifest.size_bytes {
        return Err(GateError::Integrity(format!(
            "size mismatch for {}: {} bytes, manifest says {}",
            csv_path.display(),
            size,
            manifest.size_bytes
        )));
    }
    let hash = file_sha256(csv_path)?;
    if !hash.eq_ignore_ascii_case(&manifest.hash_sha256) {
        return Err(GateError::Integrity(format!(
            "hash mismatch for {}: {} != {}",
            csv_path.display(),
            hash,
            manifest.hash_sha256
        )));
    }
    Ok(())
}

/// Load one numeric column from a headered CSV into a `SampleFrame`.
///
/// Blank lines and `#` comments are skipped; unparsable or empty cells become
/// NaN so row alignment survives (the estimator drops them).
pub fn load_csv_column(path: &Path, column: &str) -> Result<SampleFrame, GateError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut header: Option<Vec<String>> = None;
    let mut col_idx: usize = 0;
    let mut values: Vec<f64> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match &header {
            None => {
                let cols: Vec<String> = trimmed.split(',').map(|s| s.trim().to_string()).collect();
                col_idx = cols.iter().position(|c| c == column).ok_or_else(|| {
                    GateError::Validation(format!(
                        "column '{}' not found in {} (cols: {:?})",
                        column,
                        path.display(),
                        cols
                    ))
                })?;
                header = Some(cols);
            }
            Some(_) => {
                let cell = trimmed.split(',').nth(col_idx).unwrap_or("");
                values.push(cell.trim().parse::<f64>().unwrap_or(f64::NAN));
            }
        }
    }

    if header.is_none() {
        return Err(GateError::Validation(format!(
            "no header row in {}",
            path.display()
        )));
    }
    Ok(SampleFrame::from_column(column, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut fh = File::create(&path).unwrap();
        fh.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_frame_rejects_ragged_columns() {
        let mut frame = SampleFrame::from_column("price", vec![1.0, 2.0]);
        let err = frame.insert_column("qty", vec![1.0]).unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
    }

    #[test]
    fn test_missing_column_is_validation_error() {
        let frame = SampleFrame::from_column("price", vec![1.0]);
        let err = frame.column("sku").unwrap_err();
        assert!(err.to_string().contains("sku"));
    }

    #[test]
    fn test_file_sha256_deterministic_and_tamper_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_csv(dir.path(), "a.csv", "price\n10.0\n");
        assert_eq!(file_sha256(&a).unwrap(), file_sha256(&a).unwrap());

        let b = write_csv(dir.path(), "b.csv", "price\n10.1\n");
        assert_ne!(file_sha256(&a).unwrap(), file_sha256(&b).unwrap());
    }

    #[test]
    fn test_verify_manifest_fails_closed_on_edit() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), "base.csv", "price\n10.0\n11.0\n");
        let manifest = BaselineManifest {
            hash_sha256: file_sha256(&csv).unwrap(),
            size_bytes: std::fs::metadata(&csv).unwrap().len(),
            stats: BaselineStats {
                rows: 2,
                mean: 10.5,
                std: 0.5,
                min: 10.0,
                max: 11.0,
                median: 10.5,
            },
        };
        verify_manifest(&csv, &manifest).unwrap();

        // One-byte edit must be detected.
        let csv2 = write_csv(dir.path(), "base.csv", "price\n10.0\n11.1\n");
        let err = verify_manifest(&csv2, &manifest).unwrap_err();
        assert!(matches!(err, GateError::Integrity(_)));
    }

    #[test]
    fn test_load_csv_column() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "p.csv",
            "sku,price\n# comment\nA,10.0\nB,\nC,11.5\n",
        );
        let frame = load_csv_column(&csv, "price").unwrap();
        let col = frame.column("price").unwrap();
        assert_eq!(col.len(), 3);
        assert_eq!(col[0], 10.0);
        assert!(col[1].is_nan());
        assert_eq!(col[2], 11.5);

        let err = load_csv_column(&csv, "quantity").unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
    }
}
