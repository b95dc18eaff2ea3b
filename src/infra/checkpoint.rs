// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores models using Burn's CompactRecorder.
//
// A single checkpoint is two files sharing one stem:
//   1. {stem}.mpk.gz  model weights (MessagePack + gzip)
//   2. {stem}.json    model config + the statistics it was sized with
//
// The sidecar is what makes a checkpoint self-describing: loading
// rebuilds an empty model from the sidecar, then pours the weights
// into it. The dataset loaded at test time plays no part.
//
// File layout under the checkpoint directory:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_1.json     ← config + statistics for epoch 1
//     ...
//     latest_epoch.json      ← number of the latest epoch
//     best_epoch.json        ← epoch with the lowest val loss
//     run_config.json        ← full run configuration
//     metrics.csv            ← see metrics.rs

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::config::RunConfig;
use crate::domain::statistics::DatasetStatistics;
use crate::ml::recommender::Recommender;

/// JSON sidecar written next to every weights file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta<C> {
    pub config:     C,
    pub statistics: DatasetStatistics,
}

fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}

/// Write `{path}.mpk.gz` and `{path}.json`.
pub fn save_model<B: Backend, M: Recommender<B>>(model: &M, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", parent.display()))?;
    }

    CompactRecorder::new()
        .record(model.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

    let meta = CheckpointMeta { config: model.config(), statistics: model.statistics() };
    let meta_file = meta_path(path);
    fs::write(&meta_file, serde_json::to_string_pretty(&meta)?)
        .with_context(|| format!("Cannot write '{}'", meta_file.display()))?;

    tracing::debug!("Saved checkpoint '{}'", path.display());
    Ok(())
}

/// Rebuild a model from its sidecar and load the weights into it.
pub fn load_model<B: Backend, M: Recommender<B>>(path: &Path, device: &B::Device) -> Result<M> {
    let meta_file = meta_path(path);
    let json = fs::read_to_string(&meta_file).with_context(|| {
        format!("Cannot read '{}'. Have you trained the model first?", meta_file.display())
    })?;
    let meta: CheckpointMeta<M::Config> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid checkpoint metadata in '{}'", meta_file.display()))?;

    let record = CompactRecorder::new()
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

    tracing::debug!(
        "Loaded checkpoint '{}' ({} users, {} items)",
        path.display(), meta.statistics.n_users, meta.statistics.n_items
    );
    Ok(M::init(&meta.config, meta.statistics, device).load_record(record))
}

/// Manages per-epoch checkpoints and run metadata in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Save the model for `epoch` and move the latest pointer to it.
    pub fn save_epoch<B: Backend, M: Recommender<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        model.save_model(&self.epoch_path(epoch))?;
        self.write_pointer("latest_epoch.json", epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Remember `epoch` as the best one seen so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_pointer("best_epoch.json", epoch)
    }

    /// Forget the best epoch of an earlier run in this directory.
    pub fn clear_best(&self) -> Result<()> {
        let path = self.dir.join("best_epoch.json");
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed stale '{}'", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Cannot remove '{}'", path.display())),
        }
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_pointer("latest_epoch.json")
            .context("No checkpoint found. Have you run 'train' first?")
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.read_pointer("best_epoch.json").ok()
    }

    /// Load the best checkpoint, or the latest one if no best was marked.
    /// Returns the epoch alongside the model.
    pub fn load_best<B: Backend, M: Recommender<B>>(&self, device: &B::Device) -> Result<(usize, M)> {
        let epoch = match self.best_epoch() {
            Some(epoch) => epoch,
            None => self.latest_epoch()?,
        };
        tracing::info!("Loading checkpoint from epoch {}", epoch);
        let model = M::load_model(&self.epoch_path(epoch), device)?;
        Ok((epoch, model))
    }

    pub fn save_run_config(&self, cfg: &RunConfig) -> Result<()> {
        let path = self.dir.join("run_config.json");
        cfg.save(&path)?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_run_config(&self) -> Result<RunConfig> {
        RunConfig::load(&self.dir.join("run_config.json"))
    }

    /// The saved run config, or `None` if nothing was trained here yet.
    pub fn saved_run_config(&self) -> Result<Option<RunConfig>> {
        if self.dir.join("run_config.json").exists() {
            self.load_run_config().map(Some)
        } else {
            Ok(None)
        }
    }

    fn write_pointer(&self, name: &str, epoch: usize) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {name}"))
    }

    fn read_pointer(&self, name: &str) -> Result<usize> {
        let path = self.dir.join(name);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{SemanticRecConfig, SemanticRecModel};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn model() -> SemanticRecModel<TestBackend> {
        let cfg = SemanticRecConfig::new(2, 4).with_d_model(3);
        let stats = DatasetStatistics { n_users: 5, n_items: 9 };
        SemanticRecModel::init(&cfg, stats, &Default::default())
    }

    #[test]
    fn test_epoch_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.latest_epoch().is_err());
        assert_eq!(manager.best_epoch(), None);

        manager.save_epoch(&model(), 1).unwrap();
        manager.save_epoch(&model(), 2).unwrap();
        manager.mark_best(1).unwrap();

        assert_eq!(manager.latest_epoch().unwrap(), 2);
        assert_eq!(manager.best_epoch(), Some(1));
        assert!(dir.path().join("model_epoch_2.json").exists());
    }

    #[test]
    fn test_clear_best_forgets_marker() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        manager.clear_best().unwrap();

        manager.save_epoch(&model(), 1).unwrap();
        manager.mark_best(1).unwrap();
        manager.clear_best().unwrap();
        assert_eq!(manager.best_epoch(), None);
        assert_eq!(manager.latest_epoch().unwrap(), 1);
    }

    #[test]
    fn test_load_best_falls_back_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        manager.save_epoch(&model(), 3).unwrap();

        let (epoch, loaded): (usize, SemanticRecModel<TestBackend>) =
            manager.load_best(&Default::default()).unwrap();
        assert_eq!(epoch, 3);
        assert_eq!(loaded.statistics(), DatasetStatistics { n_users: 5, n_items: 9 });
    }

    #[test]
    fn test_sidecar_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m");
        save_model(&model(), &path).unwrap();

        let json = fs::read_to_string(dir.path().join("m.json")).unwrap();
        let meta: CheckpointMeta<SemanticRecConfig> = serde_json::from_str(&json).unwrap();
        assert_eq!(meta.config.semantic_id_length, 2);
        assert_eq!(meta.statistics.n_items, 9);
    }

    #[test]
    fn test_run_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let mut cfg = RunConfig::default();
        cfg.dataset = "ml-1m".to_string();
        manager.save_run_config(&cfg).unwrap();
        assert_eq!(manager.load_run_config().unwrap().dataset, "ml-1m");
    }

    #[test]
    fn test_saved_run_config_absent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.saved_run_config().unwrap().is_none());
        manager.save_run_config(&RunConfig::default()).unwrap();
        assert_eq!(manager.saved_run_config().unwrap(), Some(RunConfig::default()));
    }
}
