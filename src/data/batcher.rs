// ============================================================
// Layer 4 - Recommendation Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<RecSample>
// into tensors for the model.
//
// How batching works here:
//   1. Every RecSample is turned into its key → array record
//   2. The collator stacks each key along a new batch axis
//   3. Each stacked array becomes a tensor with the same shape
//
//   Input:  N samples, semantic ids of length L, history of H
//   Output: RecBatch with
//             semantic_ids  [N, L]
//             history_codes [N, H, L]
//             history_mask  [N, H]
//             user_ids, item_ids, feedback [N]
//
// All samples coming out of one InteractionDataset share L and
// H, so collation only fails if samples from differently shaped
// views are mixed, or the batch is empty.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::collate::{collate, Batch, Values};
use crate::data::dataset::RecSample;
use crate::domain::error::{PipelineError, PipelineResult};

// ─── RecBatch ─────────────────────────────────────────────────────────────────
/// A batch of samples ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct RecBatch<B: Backend> {
    pub user_ids:      Tensor<B, 1, Int>,
    pub item_ids:      Tensor<B, 1, Int>,
    /// Semantic id codes of the target item: [batch_size, L]
    pub semantic_ids:  Tensor<B, 2, Int>,
    /// Codes of the history items: [batch_size, H, L]
    pub history_codes: Tensor<B, 3, Int>,
    /// 1.0 = real history item, 0.0 = padding: [batch_size, H]
    pub history_mask:  Tensor<B, 2>,
    /// Ground truth ratings: [batch_size]
    pub feedback:      Tensor<B, 1>,
}

impl<B: Backend> RecBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.feedback.dims()[0]
    }
}

// ─── RecBatcher ───────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on it.
#[derive(Clone, Debug)]
pub struct RecBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> RecBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Collate and convert, reporting shape problems instead of panicking.
    pub fn try_batch(&self, items: Vec<RecSample>) -> PipelineResult<RecBatch<B>> {
        let records = items.iter().map(RecSample::to_record).collect();
        let mut batch = collate(records)?;

        Ok(RecBatch {
            user_ids:      int_tensor(&mut batch, "user_id", &self.device)?,
            item_ids:      int_tensor(&mut batch, "item_id", &self.device)?,
            semantic_ids:  int_tensor(&mut batch, "semantic_ids", &self.device)?,
            history_codes: int_tensor(&mut batch, "history_codes", &self.device)?,
            history_mask:  float_tensor(&mut batch, "history_mask", &self.device)?,
            feedback:      float_tensor(&mut batch, "feedback", &self.device)?,
        })
    }
}

// The DataLoader never hands over an empty batch, and every sample of
// one dataset has the same shape, so a failure here is a programming
// error rather than bad input.
impl<B: Backend> Batcher<RecSample, RecBatch<B>> for RecBatcher<B> {
    fn batch(&self, items: Vec<RecSample>) -> RecBatch<B> {
        let n_samples = items.len();
        let first = items.first().map(|s| (s.user_id, s.item_id));
        match self.try_batch(items) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(
                    "Cannot assemble batch of {} samples (first user/item {:?}): {}",
                    n_samples, first, e
                );
                panic!("cannot assemble batch of {n_samples} samples: {e}")
            }
        }
    }
}

/// Remove `key` from the batch, checking it has rank `D`.
fn take_field<const D: usize>(batch: &mut Batch, key: &str) -> PipelineResult<(Vec<usize>, Values)> {
    let array = batch.take(key)?;
    if array.shape().len() != D {
        return Err(PipelineError::batch_field(key, format!(
            "expected a rank-{} array, got shape {:?}", D, array.shape()
        )));
    }
    let shape = array.shape().to_vec();
    Ok((shape, array.into_values()))
}

fn int_tensor<B: Backend, const D: usize>(
    batch:  &mut Batch,
    key:    &str,
    device: &B::Device,
) -> PipelineResult<Tensor<B, D, Int>> {
    match take_field::<D>(batch, key)? {
        (shape, Values::Int(v)) => Ok(Tensor::from_data(TensorData::new(v, shape), device)),
        (_, Values::Float(_)) => Err(PipelineError::batch_field(key, "expected integer values, got floats")),
    }
}

fn float_tensor<B: Backend, const D: usize>(
    batch:  &mut Batch,
    key:    &str,
    device: &B::Device,
) -> PipelineResult<Tensor<B, D>> {
    match take_field::<D>(batch, key)? {
        (shape, Values::Float(v)) => Ok(Tensor::from_data(TensorData::new(v, shape), device)),
        (_, Values::Int(_)) => Err(PipelineError::batch_field(key, "expected float values, got integers")),
    }
}
