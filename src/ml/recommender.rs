// ============================================================
// Layer 5 - Recommender Contract
// ============================================================
// The capability set any model must provide to be driven by the
// trainer and the test use case:
//
//   forward / predict     RecBatch → one score per example
//   calculate_loss        differentiable scalar + named terms
//   save_model/load_model weights + config + statistics
//   freeze/unfreeze       toggle gradient tracking
//   count_parameters      total / trainable / non-trainable
//   summary               config, sizing and per-submodule counts
//
// Persistence, freezing and counting have default bodies built on
// burn's Module machinery, so a concrete model only writes its
// architecture (init, forward, loss).
//
// A checkpoint carries the {n_users, n_items} the model was sized
// with. `load_model` rebuilds the model from those, never from
// whatever dataset happens to be loaded at test time.

use anyhow::Result;
use burn::{
    module::{ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, path::Path};

use crate::data::batcher::RecBatch;
use crate::domain::statistics::DatasetStatistics;
use crate::infra::checkpoint;

/// Named loss terms, for logging only.
pub type LossBreakdown = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterCount {
    pub total:         usize,
    pub trainable:     usize,
    pub non_trainable: usize,
}

pub trait Recommender<B: Backend>: Module<B> + Sized {
    /// Construction-time hyperparameters, stored in every checkpoint
    type Config: Serialize + DeserializeOwned + Clone + Debug;

    /// Build a freshly initialised model sized by `stats`.
    fn init(config: &Self::Config, stats: DatasetStatistics, device: &B::Device) -> Self;

    fn config(&self) -> Self::Config;

    /// The statistics the model was sized with
    fn statistics(&self) -> DatasetStatistics;

    /// One prediction per example: [batch_size]
    fn forward(&self, batch: &RecBatch<B>) -> Tensor<B, 1>;

    /// Scalar training loss plus its named terms.
    fn calculate_loss(&self, batch: &RecBatch<B>) -> (Tensor<B, 1>, LossBreakdown);

    /// Evaluation-time prediction.
    fn predict(&self, batch: &RecBatch<B>) -> Tensor<B, 1> {
        self.forward(batch)
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        checkpoint::save_model::<B, Self>(self, path)
    }

    fn load_model(path: &Path, device: &B::Device) -> Result<Self> {
        checkpoint::load_model::<B, Self>(path, device)
    }

    /// Stop tracking gradients. Values are unchanged.
    fn freeze_parameters(self) -> Self {
        self.no_grad()
    }

    /// Track gradients again. Only has an effect on autodiff backends.
    fn unfreeze_parameters(self) -> Self {
        self.map(&mut GradTracking { require_grad: true })
    }

    fn count_parameters(&self) -> ParameterCount {
        let total = self.num_params();
        let mut counter = TrainableCounter::default();
        self.visit(&mut counter);
        ParameterCount {
            total,
            trainable:     counter.trainable,
            non_trainable: total - counter.trainable,
        }
    }

    /// Parameters per named submodule. Empty unless a model lists them.
    fn parameter_breakdown(&self) -> Vec<(String, usize)> {
        Vec::new()
    }

    /// Multi-line overview of the model, also logged at info level.
    fn summary(&self) -> String {
        let counts = self.count_parameters();
        let stats = self.statistics();
        let mut text = format!(
            "{:?}\n  sized for {} users / {} items\n  parameters: {} total, {} trainable, {} non-trainable",
            self.config(), stats.n_users, stats.n_items,
            counts.total, counts.trainable, counts.non_trainable
        );
        for (name, n) in self.parameter_breakdown() {
            text.push_str(&format!("\n    {name}: {n}"));
        }
        tracing::info!("Model summary:\n{}", text);
        text
    }
}

/// Sets `require_grad` on every float parameter.
struct GradTracking {
    require_grad: bool,
}

impl<B: Backend> ModuleMapper<B> for GradTracking {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        tensor.set_require_grad(self.require_grad)
    }
}

/// Counts elements of float parameters that require gradients.
#[derive(Default)]
struct TrainableCounter {
    trainable: usize,
}

impl<B: Backend> ModuleVisitor<B> for TrainableCounter {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        if tensor.is_require_grad() {
            self.trainable += tensor.shape().num_elements();
        }
    }
}
