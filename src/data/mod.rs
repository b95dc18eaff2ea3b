// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// This layer handles everything from raw interaction logs
// all the way to tensor batches.
//
// The pipeline flows in this order:
//
//   interactions.csv / synthetic generator
//       │
//       ▼
//   CsvInteractionLoader  → parses rows into Interaction records
//       │
//       ▼
//   ChronologicalSplitter → per-user 70/10/20 split by time
//       │
//       ▼
//   InteractionDataset    → one view per split, + semantic ids
//       │                   + history context (burn Dataset)
//       ▼
//   collate / RecBatcher  → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader            → feeds batches to the training loop
//
// Each module is responsible for exactly one step, so each step
// is independently testable.

/// Reads and writes delimited interaction files
pub mod loader;

/// Per-user chronological train/valid/test split
pub mod splitter;

/// Item id → fixed-length semantic code lookup
pub mod semantic_ids;

/// Implements Burn's Dataset trait over one split
pub mod dataset;

/// Shape-polymorphic stacking of records into batches
pub mod collate;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded synthetic interactions and semantic ids
pub mod synthetic;
