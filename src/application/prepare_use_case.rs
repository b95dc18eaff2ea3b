// ============================================================
// Layer 2 - PrepareUseCase
// ============================================================
// Produces the files the training pipeline reads.
//
// `generate` (no real data needed):
//   Step 1: Generate seeded synthetic interactions (Layer 4)
//   Step 2: Write the raw interaction file          (Layer 4)
//   Step 3: Split chronologically per user          (Layer 4)
//   Step 4: Write the three split files              (Layer 4)
//   Step 5: Generate and save random semantic ids    (Layer 4)
//
// `split` (real data already on disk):
//   Steps 3 and 4 on {data_dir}/{dataset}.csv

use anyhow::{Context, Result};

use crate::application::config::RunConfig;
use crate::data::{
    loader::{write_interactions, CsvInteractionLoader},
    splitter::{ChronologicalSplitter, Partition},
    synthetic::{random_semantic_ids, SyntheticConfig, SyntheticInteractions},
};
use crate::domain::{
    interaction::{Interaction, Split},
    traits::InteractionSource,
};

/// Record counts of a prepared dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSummary {
    pub n_interactions: usize,
    pub train:          usize,
    pub valid:          usize,
    pub test:           usize,
    pub dropped_users:  usize,
}

pub struct PrepareUseCase {
    config: RunConfig,
}

impl PrepareUseCase {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Synthetic data for `size`, or for the preset named by the dataset.
    pub fn generate(&self, size: Option<SyntheticConfig>) -> Result<PrepareSummary> {
        let cfg = &self.config;
        let size = match size {
            Some(size) => size,
            None => SyntheticConfig::preset(&cfg.dataset, cfg.training.seed).with_context(|| {
                format!(
                    "No synthetic preset for dataset '{}' (known: ml-100k, ml-1m); pass explicit sizes",
                    cfg.dataset
                )
            })?,
        };

        // ── Steps 1-2: interactions ──────────────────────────────────────────
        let records = SyntheticInteractions::new(size).load_all()?;
        write_interactions(&cfg.interactions_path(), &records, &cfg.columns)?;

        // ── Steps 3-4: split ─────────────────────────────────────────────────
        let summary = self.split_and_write(&records)?;

        // ── Step 5: semantic ids ─────────────────────────────────────────────
        let table = random_semantic_ids(size.n_items, cfg.semantic_id, size.seed)?;
        table.save(&cfg.semantic_ids_path())?;
        tracing::info!(
            "Wrote {} semantic ids to '{}'",
            table.len(), cfg.semantic_ids_path().display()
        );

        Ok(summary)
    }

    /// Split the raw interaction file of the configured dataset.
    pub fn split_existing(&self) -> Result<PrepareSummary> {
        let cfg = &self.config;
        let records = CsvInteractionLoader::new(cfg.interactions_path(), cfg.columns.clone())
            .load_all()
            .with_context(|| format!("Cannot load interactions for dataset '{}'", cfg.dataset))?;
        self.split_and_write(&records)
    }

    fn split_and_write(&self, records: &[Interaction]) -> Result<PrepareSummary> {
        let cfg = &self.config;
        let splitter = ChronologicalSplitter::new(cfg.split)?;
        let partition: Partition = splitter.split(records, &cfg.dataset);

        for split in Split::ALL {
            let path = cfg.split_path(split);
            write_interactions(&path, partition.records(split), &cfg.columns)?;
            tracing::info!("Wrote {} split to '{}'", split, path.display());
        }

        let (train, valid, test) = partition.counts();
        Ok(PrepareSummary {
            n_interactions: records.len(),
            train,
            valid,
            test,
            dropped_users: partition.dropped_users,
        })
    }
}
