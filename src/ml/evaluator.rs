// ============================================================
// Layer 5 - Evaluator
// ============================================================
// Runs a model over a stream of batches without gradients and
// reduces the predictions to rating-error metrics:
//
//   loss  mean of per-batch `calculate_loss` (as in training)
//   rmse  sqrt(Σ (pred - y)² / N)   over all examples
//   mae   Σ |pred - y| / N          over all examples
//
// Used for the validation phase of every epoch and for `test`.
// No batches at all gives NaN metrics and n_samples = 0.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::batcher::RecBatch;
use crate::ml::recommender::Recommender;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvalReport {
    pub n_samples: usize,
    pub loss:      f64,
    pub rmse:      f64,
    pub mae:       f64,
}

impl EvalReport {
    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }
}

pub fn evaluate<B, M, I>(model: &M, batches: I) -> EvalReport
where
    B: Backend,
    M: Recommender<B>,
    I: IntoIterator<Item = RecBatch<B>>,
{
    let mut loss_sum    = 0.0f64;
    let mut n_batches   = 0usize;
    let mut squared_sum = 0.0f64;
    let mut abs_sum     = 0.0f64;
    let mut n_samples   = 0usize;

    for batch in batches {
        let (loss, _) = model.calculate_loss(&batch);
        loss_sum  += loss.into_scalar().elem::<f64>();
        n_batches += 1;

        let error = model.predict(&batch) - batch.feedback.clone();
        squared_sum += error.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        abs_sum     += error.abs().sum().into_scalar().elem::<f64>();
        n_samples   += batch.batch_size();
    }

    if n_samples == 0 {
        return EvalReport { n_samples, loss: f64::NAN, rmse: f64::NAN, mae: f64::NAN };
    }

    let n = n_samples as f64;
    EvalReport {
        n_samples,
        loss: loss_sum / n_batches as f64,
        rmse: (squared_sum / n).sqrt(),
        mae:  abs_sum / n,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::RecBatcher;
    use crate::data::dataset::RecSample;
    use crate::domain::statistics::DatasetStatistics;
    use crate::ml::model::{SemanticRecConfig, SemanticRecModel};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn model() -> SemanticRecModel<TestBackend> {
        let cfg = SemanticRecConfig::new(2, 4).with_d_model(3);
        SemanticRecModel::init(&cfg, DatasetStatistics { n_users: 2, n_items: 2 }, &Default::default())
    }

    fn sample(feedback: f32) -> RecSample {
        RecSample {
            user_id: 1, item_id: 1,
            semantic_ids: vec![1, 2], feedback,
            history_codes: vec![3, 0], history_mask: vec![1.0],
        }
    }

    #[test]
    fn test_no_batches_is_nan() {
        let report = evaluate(&model(), Vec::<RecBatch<TestBackend>>::new());
        assert!(report.is_empty());
        assert!(report.rmse.is_nan());
    }

    #[test]
    fn test_metrics_match_predictions() {
        let model = model();
        let batcher = RecBatcher::<TestBackend>::new(Default::default());
        let batches = vec![
            batcher.try_batch(vec![sample(1.0), sample(3.0)]).unwrap(),
            batcher.try_batch(vec![sample(5.0)]).unwrap(),
        ];

        // Identical inputs give the same prediction p for every example
        let p = model
            .predict(&batches[1])
            .into_scalar()
            .elem::<f64>();
        let errors = [p - 1.0, p - 3.0, p - 5.0];
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / 3.0).sqrt();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / 3.0;

        let report = evaluate(&model, batches);
        assert_eq!(report.n_samples, 3);
        assert!((report.rmse - rmse).abs() < 1e-4);
        assert!((report.mae - mae).abs() < 1e-4);
        assert!(report.rmse >= report.mae);
    }
}
