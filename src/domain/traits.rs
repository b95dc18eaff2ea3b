// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer only sees these traits, so a CSV file,
// a synthetic generator or a future database reader can all
// feed the same pipeline.

use anyhow::Result;

use crate::domain::interaction::Interaction;

// ─── InteractionSource ────────────────────────────────────────────────────────
/// Any component that can produce raw interaction records.
///
/// Implementations:
///   - CsvInteractionLoader → delimited text file with a header row
///   - SyntheticInteractions → seeded random interactions
pub trait InteractionSource {
    /// Load every record, in source order.
    /// Source order is the tie-break for equal timestamps downstream.
    fn load_all(&self) -> Result<Vec<Interaction>>;
}
