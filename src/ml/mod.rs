// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs a model lives here.
//
//   recommender.rs  The capability contract every model offers:
//                   forward, loss, persistence, freezing and
//                   parameter counting
//
//   model.rs        SemanticRecModel, a small rating regressor
//                   over semantic-id code embeddings
//
//   trainer.rs      Train + validation loop with Adam, metrics
//                   and a checkpoint per epoch
//
//   evaluator.rs    Gradient-free loss / RMSE / MAE over batches
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Model base contract
pub mod recommender;

/// Semantic-id rating model
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Evaluation metrics over a batch stream
pub mod evaluator;
