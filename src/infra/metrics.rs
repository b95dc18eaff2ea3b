// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: mean training loss (MSE + L2) over batches
//   - val_loss:   mean validation loss over batches
//   - val_rmse:   root mean squared rating error on valid split
//   - val_mae:    mean absolute rating error on valid split
//
// Output file: checkpoints/metrics.csv
//
//   epoch,train_loss,val_loss,val_rmse,val_mae
//   1,3.124500,3.089200,1.757600,1.402000
//   2,1.890100,1.954300,1.398000,1.120000
//
// An empty validation split logs NaN for the validation columns.
// The header is written once; later runs append.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "epoch,train_loss,val_loss,val_rmse,val_mae";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    pub val_rmse:   f64,
    pub val_mae:    f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_rmse: f64, val_mae: f64) -> Self {
        Self { epoch, train_loss, val_loss, val_rmse, val_mae }
    }

    /// Returns true if this epoch improved over the previous best val_loss.
    /// NaN never improves.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.val_rmse, m.val_mae,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
