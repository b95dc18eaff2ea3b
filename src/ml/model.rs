use burn::{
    nn::{
        loss::{MseLoss, Reduction},
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::data::batcher::RecBatch;
use crate::domain::statistics::DatasetStatistics;
use crate::ml::recommender::{LossBreakdown, Recommender};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally - do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SemanticRecConfig {
    pub semantic_id_length: usize,
    pub codebook_size:      usize,
    #[config(default = 64)]
    pub d_model:            usize,
    /// Weight of the L2 penalty on the code embeddings
    #[config(default = 0.0)]
    pub l2_weight:          f64,
}

/// Rating regressor over semantic-id codes.
///
/// Position `p` of a semantic id looks its code up in its own
/// block of the code table (`code + p * codebook_size`), so the same
/// code at different positions gets different vectors. An item is the
/// mean of its L code vectors; a user is the masked mean of their
/// history items, passed through a linear layer. The score is the dot
/// product of the two.
#[derive(Module, Debug)]
pub struct SemanticRecModel<B: Backend> {
    pub code_embedding:     Embedding<B>,
    pub user_projection:    Linear<B>,
    pub semantic_id_length: usize,
    pub codebook_size:      usize,
    pub d_model:            usize,
    pub l2_weight:          f64,
    pub n_users:            usize,
    pub n_items:            usize,
}

impl<B: Backend> SemanticRecModel<B> {
    /// codes: [n, L] → item vectors [n, d_model]
    pub fn embed_items(&self, codes: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [n, length] = codes.dims();
        let offsets = Tensor::<B, 1, Int>::arange(0..length as i64, &codes.device())
            .mul_scalar(self.codebook_size as i64)
            .unsqueeze::<2>()
            .expand([n, length]);

        self.code_embedding
            .forward(codes + offsets) // [n, L, d]
            .mean_dim(1)
            .reshape([n, self.d_model])
    }

    /// codes: [n, H, L], mask: [n, H] → user vectors [n, d_model]
    pub fn encode_history(&self, codes: Tensor<B, 3, Int>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, history_len, length] = codes.dims();
        let d = self.d_model;

        let items = self
            .embed_items(codes.reshape([n * history_len, length]))
            .reshape([n, history_len, d]);
        let weights = mask.clone().reshape([n, history_len, 1]).expand([n, history_len, d]);

        // Users without history get a zero vector, not a division by zero
        let summed = (items * weights).sum_dim(1).reshape([n, d]);
        let count = mask.sum_dim(1).clamp_min(1.0).expand([n, d]);

        self.user_projection.forward(summed / count)
    }
}

impl<B: Backend> Recommender<B> for SemanticRecModel<B> {
    type Config = SemanticRecConfig;

    fn init(config: &SemanticRecConfig, stats: DatasetStatistics, device: &B::Device) -> Self {
        let vocab = config.semantic_id_length * config.codebook_size;
        Self {
            code_embedding:     EmbeddingConfig::new(vocab, config.d_model).init(device),
            user_projection:    LinearConfig::new(config.d_model, config.d_model).init(device),
            semantic_id_length: config.semantic_id_length,
            codebook_size:      config.codebook_size,
            d_model:            config.d_model,
            l2_weight:          config.l2_weight,
            n_users:            stats.n_users,
            n_items:            stats.n_items,
        }
    }

    fn config(&self) -> SemanticRecConfig {
        SemanticRecConfig::new(self.semantic_id_length, self.codebook_size)
            .with_d_model(self.d_model)
            .with_l2_weight(self.l2_weight)
    }

    fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics { n_users: self.n_users, n_items: self.n_items }
    }

    /// batch → predicted feedback: [batch_size]
    fn forward(&self, batch: &RecBatch<B>) -> Tensor<B, 1> {
        let n = batch.batch_size();
        let items = self.embed_items(batch.semantic_ids.clone());
        let users = self.encode_history(batch.history_codes.clone(), batch.history_mask.clone());
        (users * items).sum_dim(1).reshape([n])
    }

    fn calculate_loss(&self, batch: &RecBatch<B>) -> (Tensor<B, 1>, LossBreakdown) {
        let predictions = self.forward(batch);
        let mse = MseLoss::new().forward(predictions, batch.feedback.clone(), Reduction::Mean);
        let l2 = self.code_embedding.weight.val().powf_scalar(2.0).sum().mul_scalar(self.l2_weight);

        let mut breakdown = LossBreakdown::new();
        breakdown.insert("mse".to_string(), mse.clone().into_scalar().elem::<f64>());
        breakdown.insert("l2".to_string(), l2.clone().into_scalar().elem::<f64>());

        (mse + l2, breakdown)
    }

    fn parameter_breakdown(&self) -> Vec<(String, usize)> {
        vec![
            ("code_embedding".to_string(), self.code_embedding.num_params()),
            ("user_projection".to_string(), self.user_projection.num_params()),
        ]
    }
}
