// ============================================================
// Layer 4 - Synthetic Data Generator
// ============================================================
// Produces seeded, reproducible test data so the whole pipeline
// can run without a real dataset:
//
//   - interactions: uniform random (user, item) pairs with a
//     rating in 1..=5 and timestamps 0, 1, 2, ... in row order
//   - semantic ids: one row of uniform random codes per item
//
// The seed is the ONLY source of randomness in the repository's
// data path. The splitter itself is deterministic, so a fixed
// seed gives identical splits on every run.

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::semantic_ids::{SemanticIdConfig, SemanticIdTable};
use crate::domain::interaction::Interaction;
use crate::domain::traits::InteractionSource;

/// Size of a generated dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub n_users:        usize,
    pub n_items:        usize,
    pub n_interactions: usize,
    pub seed:           u64,
}

impl SyntheticConfig {
    /// Named presets matching the small MovieLens stand-ins.
    pub fn preset(dataset: &str, seed: u64) -> Option<Self> {
        let (n_users, n_items, n_interactions) = match dataset {
            "ml-100k" => (100, 200, 5_000),
            "ml-1m"   => (200, 400, 10_000),
            _ => return None,
        };
        Some(Self { n_users, n_items, n_interactions, seed })
    }
}

/// Seeded random interactions.
pub struct SyntheticInteractions {
    config: SyntheticConfig,
}

impl SyntheticInteractions {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self) -> Vec<Interaction> {
        let c = &self.config;
        let mut rng = StdRng::seed_from_u64(c.seed);

        (0..c.n_interactions)
            .map(|t| Interaction {
                user_id:   rng.gen_range(0..c.n_users as i64),
                item_id:   rng.gen_range(0..c.n_items as i64),
                feedback:  rng.gen_range(1..=5) as f64,
                timestamp: t as i64,
            })
            .collect()
    }
}

impl InteractionSource for SyntheticInteractions {
    fn load_all(&self) -> Result<Vec<Interaction>> {
        anyhow::ensure!(
            self.config.n_users > 0 && self.config.n_items > 0,
            "synthetic dataset needs at least one user and one item"
        );
        let records = self.generate();
        tracing::info!(
            "Generated {} synthetic interactions ({} users, {} items, seed {})",
            records.len(),
            self.config.n_users,
            self.config.n_items,
            self.config.seed
        );
        Ok(records)
    }
}

/// Random semantic ids for items `0..n_items`.
pub fn random_semantic_ids(n_items: usize, config: SemanticIdConfig, seed: u64) -> Result<SemanticIdTable> {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<Vec<u32>> = (0..n_items)
        .map(|_| (0..config.length).map(|_| rng.gen_range(0..config.codebook_size)).collect())
        .collect();
    Ok(SemanticIdTable::from_rows(config, rows)?)
}
