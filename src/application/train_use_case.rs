// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the run config              (Layer 2)
//   Step 2: Load / split interactions             (Layer 4 - data)
//   Step 3: Load semantic ids, build the views    (Layer 4 - data)
//   Step 4: Reconcile statistics across views     (Layer 3 - domain)
//   Step 5: Save the run config                   (Layer 6 - infra)
//   Step 6: Run the training loop                 (Layer 5 - ml)
//
// The model is sized from the maximum statistics over all three
// views, and that size travels with every checkpoint.

use anyhow::Result;

use crate::application::{config::RunConfig, datasets::load_bundle};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    model::SemanticRecConfig,
    trainer::{run_training, TrainSummary},
};

impl RunConfig {
    /// Model hyperparameters implied by this run.
    pub fn model_config(&self) -> SemanticRecConfig {
        SemanticRecConfig::new(self.semantic_id.length, self.semantic_id.codebook_size as usize)
            .with_d_model(self.model.d_model)
            .with_l2_weight(self.model.l2_weight)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Steps 2-3: Views ──────────────────────────────────────────────────
        let bundle = load_bundle(cfg)?;

        // ── Step 4: Statistics ────────────────────────────────────────────────
        let stats = bundle.statistics();
        tracing::info!(
            "[{}] {} users, {} items across all splits",
            cfg.dataset, stats.n_users, stats.n_items
        );

        // ── Step 5: Save config ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_run_config(cfg)?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        run_training(
            &cfg.training,
            &cfg.model_config(),
            stats,
            bundle.train,
            bundle.valid,
            &ckpt_manager,
        )
    }
}
