// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting file persistence used by the ML and application
// layers:
//
//   checkpoint.rs  Model weights (CompactRecorder) plus a JSON
//                  sidecar with config and statistics, epoch
//                  pointers and the saved run config
//
//   metrics.rs     Epoch-level metrics appended to a CSV file
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
