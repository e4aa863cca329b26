// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch so a run can be plotted or
// diffed after the fact without scraping logs. The header is
// written once when the file is created; subsequent sessions
// against the same file keep appending.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One row of the per-epoch metrics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_acc: f64,
    pub lr: f64,
}

pub struct MetricsLogger {
    path: PathBuf,
}

impl MetricsLogger {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create metrics dir {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, metrics: &EpochMetrics) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open metrics file {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(metrics).context("failed to write metrics row")?;
        writer.flush().context("failed to flush metrics file")?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<EpochMetrics>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("failed to open metrics file {}", self.path.display()))?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row.context("failed to parse metrics row")?);
        }
        Ok(rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(epoch: usize, val_loss: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.5,
            val_loss,
            val_acc: 0.42,
            lr: 0.001,
        }
    }

    #[test]
    fn test_rows_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path().join("metrics.csv")).unwrap();
        logger.log(&sample(0, 2.0)).unwrap();
        logger.log(&sample(1, 1.8)).unwrap();

        let rows = logger.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample(0, 2.0));
        assert_eq!(rows[1], sample(1, 1.8));
    }

    #[test]
    fn test_header_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metrics.csv");
        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&sample(0, 2.0)).unwrap();
        logger.log(&sample(1, 1.9)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let headers = contents
            .lines()
            .filter(|l| l.starts_with("epoch"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/run/metrics.csv");
        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&sample(0, 2.0)).unwrap();
        assert!(path.exists());
    }
}
