// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types and traits that describe what the pipeline
// works with: interaction records, split modes, dataset
// statistics and the error taxonomy shared by every layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums and traits
//
// Everything above this layer (data, ml, application) speaks
// in these types, so they are the contract between layers.

/// A single (user, item, feedback, timestamp) event
pub mod interaction;

/// Per-view user/item counts
pub mod statistics;

/// Error taxonomy for construction and batch assembly
pub mod error;

/// Core abstractions (traits) that other layers implement
pub mod traits;
