// ============================================================
// Layer 2 - Run Configuration
// ============================================================
// Everything one pipeline run needs, in one serialisable struct:
//
//   dataset / data_dir   what to read and where
//   columns              header names of the interaction file
//   split                cut ratios and min interactions
//   semantic_id          id length and codebook size
//   history_len          history items per example
//   training             epochs, batch size, lr, seed, workers
//   model                model hyperparameters
//
// Built from defaults, optionally overlaid by a JSON file
// (--config), then by explicit CLI flags. The final value is
// saved next to the checkpoints so a run can be reproduced.
//
// File layout derived from it:
//   {data_dir}/{dataset}.csv                   raw interactions
//   {data_dir}/{dataset}_{split}.csv           split files
//   {data_dir}/{dataset}_semantic_ids.json     semantic id table
//   {results_dir}/test_results_{dataset}.json  test report

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{loader::ColumnConfig, semantic_ids::SemanticIdConfig, splitter::SplitConfig};
use crate::domain::interaction::Split;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    /// Seeds data generation and DataLoader shuffling
    pub seed:          u64,
    pub num_workers:   usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs:        20,
            batch_size:    256,
            learning_rate: 1e-3,
            seed:          42,
            num_workers:   1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub d_model:   usize,
    pub l2_weight: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { d_model: 64, l2_weight: 1e-6 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dataset:        String,
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub results_dir:    String,
    pub columns:        ColumnConfig,
    pub split:          SplitConfig,
    pub semantic_id:    SemanticIdConfig,
    pub history_len:    usize,
    pub training:       TrainingConfig,
    pub model:          ModelSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dataset:        "ml-100k".to_string(),
            data_dir:       "data".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            results_dir:    "results".to_string(),
            columns:        ColumnConfig::default(),
            split:          SplitConfig::default(),
            semantic_id:    SemanticIdConfig::default(),
            history_len:    20,
            training:       TrainingConfig::default(),
            model:          ModelSettings::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))
    }

    /// Defaults, or the file at `path` when given.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.dataset.trim().is_empty(), "dataset name must not be empty");
        self.split.validate()?;
        anyhow::ensure!(self.semantic_id.length >= 1, "semantic id length must be at least 1");
        anyhow::ensure!(self.semantic_id.codebook_size >= 1, "codebook size must be at least 1");
        anyhow::ensure!(self.history_len >= 1, "history_len must be at least 1");
        anyhow::ensure!(self.training.epochs >= 1, "epochs must be at least 1");
        anyhow::ensure!(self.training.batch_size >= 1, "batch_size must be at least 1");
        anyhow::ensure!(
            self.training.learning_rate > 0.0 && self.training.learning_rate.is_finite(),
            "learning_rate must be a positive number"
        );
        anyhow::ensure!(self.training.num_workers >= 1, "num_workers must be at least 1");
        anyhow::ensure!(self.model.d_model >= 1, "d_model must be at least 1");
        anyhow::ensure!(self.model.l2_weight >= 0.0, "l2_weight must not be negative");
        Ok(())
    }

    pub fn interactions_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(format!("{}.csv", self.dataset))
    }

    pub fn split_path(&self, split: Split) -> PathBuf {
        Path::new(&self.data_dir).join(format!("{}_{}.csv", self.dataset, split))
    }

    pub fn semantic_ids_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(format!("{}_semantic_ids.json", self.dataset))
    }

    pub fn results_path(&self) -> PathBuf {
        Path::new(&self.results_dir).join(format!("test_results_{}.json", self.dataset))
    }
}
