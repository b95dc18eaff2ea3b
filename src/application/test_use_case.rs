// ============================================================
// Layer 2 - TestUseCase
// ============================================================
// Evaluates a trained checkpoint on the held-out test split:
//
//   Step 1: Load the best (else latest) checkpoint   (Layer 6 - infra)
//   Step 2: Build the views for the dataset           (Layer 4 - data)
//   Step 3: Evaluate on the test view                 (Layer 5 - ml)
//   Step 4: Write {results_dir}/test_results_{dataset}.json
//
// The model is rebuilt from the checkpoint's own config and
// statistics; the test data only supplies examples. Its semantic
// id shape must match the loaded table exactly, otherwise codes
// would index past the code embedding.

use anyhow::{Context, Result};
use burn::data::dataloader::DataLoaderBuilder;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::application::{config::RunConfig, datasets::load_bundle};
use crate::data::{batcher::RecBatcher, semantic_ids::SemanticIdConfig};
use crate::domain::statistics::DatasetStatistics;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    evaluator::evaluate,
    model::{SemanticRecConfig, SemanticRecModel},
    recommender::{ParameterCount, Recommender},
};

type InferBackend = burn::backend::NdArray;

/// Contents of the results file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub dataset:    String,
    pub epoch:      usize,
    pub n_samples:  usize,
    pub loss:       f64,
    pub rmse:       f64,
    pub mae:        f64,
    pub statistics: DatasetStatistics,
    pub parameters: ParameterCount,
}

/// Fails when the table was built for a different semantic id shape than the model.
fn ensure_table_fits(model: &SemanticRecConfig, table: SemanticIdConfig) -> Result<()> {
    anyhow::ensure!(
        model.semantic_id_length == table.length && model.codebook_size == table.codebook_size as usize,
        "checkpoint expects semantic ids of length {} over {} codes, but the semantic id file has \
         length {} over {} codes",
        model.semantic_id_length, model.codebook_size, table.length, table.codebook_size
    );
    Ok(())
}

pub struct TestUseCase {
    config: RunConfig,
}

impl TestUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TestReport> {
        let cfg = &self.config;
        cfg.validate()?;
        let device = burn::backend::ndarray::NdArrayDevice::default();

        // ── Step 1: Checkpoint ────────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let (epoch, model): (usize, SemanticRecModel<InferBackend>) =
            ckpt_manager.load_best(&device)?;
        let statistics = model.statistics();
        tracing::info!(
            "Model from epoch {} sized for {} users / {} items",
            epoch, statistics.n_users, statistics.n_items
        );

        // ── Step 2: Views ─────────────────────────────────────────────────────
        let bundle = load_bundle(cfg)?;
        ensure_table_fits(&model.config(), bundle.test.semantic_table().config())?;
        if bundle.test.records().is_empty() {
            tracing::warn!("[{}] test split is empty", cfg.dataset);
        }

        // ── Step 3: Evaluate ──────────────────────────────────────────────────
        let loader = DataLoaderBuilder::new(RecBatcher::<InferBackend>::new(device))
            .batch_size(cfg.training.batch_size)
            .num_workers(cfg.training.num_workers)
            .build(bundle.test);
        let eval = evaluate(&model, loader.iter());

        let report = TestReport {
            dataset:    cfg.dataset.clone(),
            epoch,
            n_samples:  eval.n_samples,
            loss:       eval.loss,
            rmse:       eval.rmse,
            mae:        eval.mae,
            statistics,
            parameters: model.count_parameters(),
        };

        // ── Step 4: Results file ──────────────────────────────────────────────
        let path = cfg.results_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create results directory '{}'", parent.display()))?;
        }
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Cannot write results to '{}'", path.display()))?;
        tracing::info!("Test results saved to '{}'", path.display());

        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{prepare_use_case::PrepareUseCase, train_use_case::TrainUseCase};
    use crate::data::synthetic::{random_semantic_ids, SyntheticConfig};

    fn small_run(dir: &std::path::Path) -> RunConfig {
        let mut cfg = RunConfig::default();
        cfg.dataset = "small".to_string();
        cfg.data_dir = dir.join("data").to_string_lossy().into_owned();
        cfg.checkpoint_dir = dir.join("ckpt").to_string_lossy().into_owned();
        cfg.results_dir = dir.join("results").to_string_lossy().into_owned();
        cfg.semantic_id = SemanticIdConfig { length: 2, codebook_size: 8 };
        cfg.history_len = 3;
        cfg.training.epochs = 1;
        cfg.training.batch_size = 16;
        cfg.model.d_model = 4;
        cfg
    }

    #[test]
    fn test_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TestUseCase::new(small_run(dir.path())).execute().is_err());
    }

    #[test]
    fn test_writes_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = small_run(dir.path());
        let size = SyntheticConfig { n_users: 5, n_items: 12, n_interactions: 200, seed: 3 };
        PrepareUseCase::new(cfg.clone()).unwrap().generate(Some(size)).unwrap();
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let report = TestUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.dataset, "small");
        assert_eq!(report.epoch, 1);
        assert!(report.n_samples > 0);
        assert!(report.rmse.is_finite());

        let json = fs::read_to_string(cfg.results_path()).unwrap();
        let back: TestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_samples, report.n_samples);
        assert_eq!(back.statistics, report.statistics);
    }

    #[test]
    fn test_table_with_larger_codebook_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = small_run(dir.path());
        let size = SyntheticConfig { n_users: 5, n_items: 12, n_interactions: 200, seed: 3 };
        PrepareUseCase::new(cfg.clone()).unwrap().generate(Some(size)).unwrap();
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        // Same items, codes drawn from a wider codebook than the model knows
        cfg.semantic_id = SemanticIdConfig { length: 2, codebook_size: 64 };
        random_semantic_ids(12, cfg.semantic_id, 5).unwrap().save(&cfg.semantic_ids_path()).unwrap();

        let err = TestUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("64 codes"));
    }

    #[test]
    fn test_ensure_table_fits() {
        let model = SemanticRecConfig::new(2, 8);
        assert!(ensure_table_fits(&model, SemanticIdConfig { length: 2, codebook_size: 8 }).is_ok());
        assert!(ensure_table_fits(&model, SemanticIdConfig { length: 3, codebook_size: 8 }).is_err());
        assert!(ensure_table_fits(&model, SemanticIdConfig { length: 2, codebook_size: 4 }).is_err());
    }
}
