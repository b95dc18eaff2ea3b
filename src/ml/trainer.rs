// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
//   - Training uses MyBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on MyInnerBackend (NdArray)
//   - Validation batcher must also use MyInnerBackend
//   - Every epoch is checkpointed; the epoch with the lowest
//     validation loss is marked as best
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::config::TrainingConfig;
use crate::data::{batcher::RecBatcher, dataset::InteractionDataset};
use crate::domain::statistics::DatasetStatistics;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::evaluator::evaluate;
use crate::ml::model::{SemanticRecConfig, SemanticRecModel};
use crate::ml::recommender::{ParameterCount, Recommender};

type MyBackend      = burn::backend::Autodiff<burn::backend::NdArray>;
type MyInnerBackend = burn::backend::NdArray;

/// What a finished run reports back to the caller.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs:        usize,
    pub best_epoch:    Option<usize>,
    pub best_val_loss: f64,
    pub last:          EpochMetrics,
    pub parameters:    ParameterCount,
}

pub fn run_training(
    cfg:           &TrainingConfig,
    model_cfg:     &SemanticRecConfig,
    stats:         DatasetStatistics,
    train_dataset: InteractionDataset,
    val_dataset:   InteractionDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<TrainSummary> {
    let device = burn::backend::ndarray::NdArrayDevice::default();
    tracing::info!("Using NdArray device: {:?}", device);
    train_loop(cfg, model_cfg, stats, train_dataset, val_dataset, ckpt_manager, device)
}

fn train_loop(
    cfg:           &TrainingConfig,
    model_cfg:     &SemanticRecConfig,
    stats:         DatasetStatistics,
    train_dataset: InteractionDataset,
    val_dataset:   InteractionDataset,
    ckpt_manager:  &CheckpointManager,
    device:        burn::backend::ndarray::NdArrayDevice,
) -> Result<TrainSummary> {
    anyhow::ensure!(!train_dataset.is_empty(), "training split is empty, nothing to train on");
    if val_dataset.is_empty() {
        tracing::warn!("Validation split is empty; validation metrics will be NaN");
    }

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model = SemanticRecModel::<MyBackend>::init(model_cfg, stats, &device);
    let parameters = model.count_parameters();
    model.summary();

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(RecBatcher::<MyBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend, no autodiff overhead) ───────────
    let val_loader = DataLoaderBuilder::new(RecBatcher::<MyInnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(val_dataset);

    // A best marker left by an earlier run must not outlive it
    ckpt_manager.clear_best()?;
    let metrics_logger = MetricsLogger::new(ckpt_manager.dir())?;
    let mut best_val_loss = f64::INFINITY;
    let mut best_epoch    = None;
    let mut last          = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, breakdown) = model.calculate_loss(&batch);
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;
            tracing::trace!("epoch {} batch {}: {:?}", epoch, train_batches, breakdown);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let report = evaluate(&model_valid, val_loader.iter());

        let metrics = EpochMetrics::new(epoch, avg_train_loss, report.loss, report.rmse, report.mae);
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_rmse={:.4} | val_mae={:.4}",
            epoch, cfg.epochs, metrics.train_loss, metrics.val_loss, metrics.val_rmse, metrics.val_mae,
        );
        metrics_logger.log(&metrics)?;

        ckpt_manager.save_epoch(&model_valid, epoch)?;
        if metrics.is_improvement(best_val_loss) {
            best_val_loss = metrics.val_loss;
            best_epoch    = Some(epoch);
            ckpt_manager.mark_best(epoch)?;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val_loss, epoch);
        }
        last = Some(metrics);
    }

    tracing::info!("Training complete!");
    let last = last.ok_or_else(|| anyhow::anyhow!("no epochs were run"))?;
    Ok(TrainSummary { epochs: cfg.epochs, best_epoch, best_val_loss, last, parameters })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{dataset::UserHistory, semantic_ids::{SemanticIdConfig, SemanticIdTable}};
    use crate::domain::interaction::{Interaction, Split};
    use std::sync::Arc;

    fn view(split: Split, records: Vec<Interaction>, train: &[Interaction]) -> InteractionDataset {
        let config = SemanticIdConfig { length: 2, codebook_size: 8 };
        let rows = (0..6u32).map(|i| vec![i, 7 - i]).collect();
        let table = Arc::new(SemanticIdTable::from_rows(config, rows).unwrap());
        let history = Arc::new(UserHistory::from_train(train));
        InteractionDataset::new(split, records, table, history, 3).unwrap()
    }

    fn train_records() -> Vec<Interaction> {
        (0..12).map(|t| Interaction::new(t % 2, t % 6, 1.0 + (t % 5) as f64, t)).collect()
    }

    fn training_config(epochs: usize) -> TrainingConfig {
        TrainingConfig { epochs, batch_size: 4, learning_rate: 1e-2, seed: 7, num_workers: 1 }
    }

    #[test]
    fn test_short_run_writes_checkpoints_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let train = train_records();
        let valid = vec![Interaction::new(0, 1, 3.0, 20), Interaction::new(1, 2, 4.0, 21)];

        let summary = run_training(
            &training_config(2),
            &SemanticRecConfig::new(2, 8).with_d_model(4),
            DatasetStatistics { n_users: 2, n_items: 6 },
            view(Split::Train, train.clone(), &train),
            view(Split::Valid, valid, &train),
            &ckpt,
        )
        .unwrap();

        assert_eq!(summary.epochs, 2);
        assert_eq!(summary.last.epoch, 2);
        assert!(summary.last.train_loss.is_finite());
        assert!(summary.best_epoch.is_some());
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_empty_validation_still_trains() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let train = train_records();

        let summary = run_training(
            &training_config(1),
            &SemanticRecConfig::new(2, 8).with_d_model(4),
            DatasetStatistics { n_users: 2, n_items: 6 },
            view(Split::Train, train.clone(), &train),
            view(Split::Valid, Vec::new(), &train),
            &ckpt,
        )
        .unwrap();

        assert!(summary.last.val_loss.is_nan());
        assert_eq!(summary.best_epoch, None);
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);
    }

    #[test]
    fn test_retrain_without_validation_drops_old_best() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let train = train_records();
        let valid = vec![Interaction::new(0, 1, 3.0, 20), Interaction::new(1, 2, 4.0, 21)];
        let model_cfg = SemanticRecConfig::new(2, 8).with_d_model(4);
        let stats = DatasetStatistics { n_users: 2, n_items: 6 };

        let first = run_training(
            &training_config(3),
            &model_cfg,
            stats,
            view(Split::Train, train.clone(), &train),
            view(Split::Valid, valid, &train),
            &ckpt,
        )
        .unwrap();
        assert!(first.best_epoch.is_some());
        assert!(ckpt.best_epoch().is_some());

        run_training(
            &training_config(1),
            &model_cfg,
            stats,
            view(Split::Train, train.clone(), &train),
            view(Split::Valid, Vec::new(), &train),
            &ckpt,
        )
        .unwrap();

        assert_eq!(ckpt.best_epoch(), None);
        let (epoch, _): (usize, SemanticRecModel<MyInnerBackend>) =
            ckpt.load_best(&Default::default()).unwrap();
        assert_eq!(epoch, 1);
    }

    #[test]
    fn test_empty_training_split_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let result = run_training(
            &training_config(1),
            &SemanticRecConfig::new(2, 8).with_d_model(4),
            DatasetStatistics::default(),
            view(Split::Train, Vec::new(), &[]),
            view(Split::Valid, Vec::new(), &[]),
            &ckpt,
        );
        assert!(result.is_err());
    }
}
