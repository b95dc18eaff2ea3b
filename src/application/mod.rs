// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal per CLI command.
//
// Rules for this layer:
//   - No model code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination and configuration

/// Run configuration shared by every use case
pub mod config;

/// Files on disk → train / valid / test views
pub mod datasets;

/// Synthetic data generation and splitting
pub mod prepare_use_case;

/// The training workflow
pub mod train_use_case;

/// Checkpoint evaluation on the test split
pub mod test_use_case;
