// ============================================================
// Layer 2 - Dataset Assembly
// ============================================================
// Shared by `train` and `test`: turns files on disk into the
// three per-split views.
//
//   Step 1: Read the partition
//             split files present → read them as they are
//             otherwise           → read the raw file and split it
//   Step 2: Load the semantic id table
//   Step 3: Build the train-split user histories
//   Step 4: Build one InteractionDataset per split
//
// The table and the histories are built once and shared by all
// three views.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::application::config::RunConfig;
use crate::data::{
    dataset::{InteractionDataset, UserHistory},
    loader::CsvInteractionLoader,
    semantic_ids::SemanticIdTable,
    splitter::{ChronologicalSplitter, Partition},
};
use crate::domain::{
    interaction::Split,
    statistics::DatasetStatistics,
    traits::InteractionSource,
};

/// The train, valid and test views of one dataset.
pub struct DatasetBundle {
    pub train: InteractionDataset,
    pub valid: InteractionDataset,
    pub test:  InteractionDataset,
}

impl DatasetBundle {
    pub fn from_partition(
        mut partition: Partition,
        semantic:      Arc<SemanticIdTable>,
        history_len:   usize,
    ) -> Result<Self> {
        let history = Arc::new(UserHistory::from_train(&partition.train));
        let mut view = |split: Split| {
            InteractionDataset::new(
                split,
                partition.take(split),
                Arc::clone(&semantic),
                Arc::clone(&history),
                history_len,
            )
            .with_context(|| format!("Cannot build the {split} view"))
        };

        Ok(Self {
            train: view(Split::Train)?,
            valid: view(Split::Valid)?,
            test:  view(Split::Test)?,
        })
    }

    /// Element-wise maximum of the three views' statistics.
    pub fn statistics(&self) -> DatasetStatistics {
        let stats = [
            self.train.get_statistics(),
            self.valid.get_statistics(),
            self.test.get_statistics(),
        ];
        DatasetStatistics::reconcile(&stats)
    }
}

/// Read the split files if all three exist, otherwise split the raw file.
pub fn load_partition(cfg: &RunConfig) -> Result<Partition> {
    let split_paths = Split::ALL.map(|split| cfg.split_path(split));

    if split_paths.iter().all(|p| p.exists()) {
        tracing::info!("Reading existing split files for '{}'", cfg.dataset);
        let [train, valid, test] = split_paths.map(|path| {
            CsvInteractionLoader::new(path, cfg.columns.clone()).load_all()
        });
        return Ok(Partition { train: train?, valid: valid?, test: test?, dropped_users: 0 });
    }

    let raw = cfg.interactions_path();
    tracing::info!("Split files missing, splitting '{}'", raw.display());
    let records = CsvInteractionLoader::new(&raw, cfg.columns.clone())
        .load_all()
        .with_context(|| format!("Cannot load interactions for dataset '{}'", cfg.dataset))?;
    let splitter = ChronologicalSplitter::new(cfg.split)?;
    Ok(splitter.split(&records, &cfg.dataset))
}

/// Steps 1-4 for the configured dataset.
pub fn load_bundle(cfg: &RunConfig) -> Result<DatasetBundle> {
    let partition = load_partition(cfg)?;
    let (n_train, n_valid, n_test) = partition.counts();
    tracing::info!(
        "[{}] train={} valid={} test={}",
        cfg.dataset, n_train, n_valid, n_test
    );

    let semantic = SemanticIdTable::load(&cfg.semantic_ids_path(), Some(cfg.semantic_id))?;
    DatasetBundle::from_partition(partition, Arc::new(semantic), cfg.history_len)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{loader::write_interactions, semantic_ids::SemanticIdConfig};
    use crate::domain::interaction::Interaction;
    use burn::data::dataset::Dataset;

    fn config(dir: &std::path::Path) -> RunConfig {
        let mut cfg = RunConfig::default();
        cfg.dataset = "tiny".to_string();
        cfg.data_dir = dir.to_string_lossy().into_owned();
        cfg.semantic_id = SemanticIdConfig { length: 2, codebook_size: 8 };
        cfg.history_len = 2;
        cfg
    }

    fn write_semantic_ids(cfg: &RunConfig, n_items: u32) {
        let rows = (0..n_items).map(|i| vec![i % 8, 0]).collect();
        SemanticIdTable::from_rows(cfg.semantic_id, rows)
            .unwrap()
            .save(&cfg.semantic_ids_path())
            .unwrap();
    }

    #[test]
    fn test_raw_file_is_split() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());

        // User 1 has 10 interactions, user 2 only 3
        let mut records: Vec<Interaction> =
            (0..10).map(|t| Interaction::new(1, t % 4, 3.0, t)).collect();
        records.extend((0..3).map(|t| Interaction::new(2, 0, 1.0, t)));
        write_interactions(&cfg.interactions_path(), &records, &cfg.columns).unwrap();
        write_semantic_ids(&cfg, 4);

        let bundle = load_bundle(&cfg).unwrap();
        assert_eq!((bundle.train.len(), bundle.valid.len(), bundle.test.len()), (7, 1, 2));
        assert_eq!(bundle.statistics(), DatasetStatistics { n_users: 1, n_items: 4 });
    }

    #[test]
    fn test_existing_split_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());

        let train = vec![Interaction::new(1, 0, 1.0, 0), Interaction::new(2, 1, 1.0, 1)];
        let valid = vec![Interaction::new(1, 2, 1.0, 2)];
        write_interactions(&cfg.split_path(Split::Train), &train, &cfg.columns).unwrap();
        write_interactions(&cfg.split_path(Split::Valid), &valid, &cfg.columns).unwrap();
        write_interactions(&cfg.split_path(Split::Test), &[], &cfg.columns).unwrap();
        write_semantic_ids(&cfg, 3);

        let bundle = load_bundle(&cfg).unwrap();
        assert_eq!(bundle.train.len(), 2);
        assert_eq!(bundle.valid.len(), 1);
        assert!(bundle.test.is_empty());
        assert_eq!(bundle.statistics(), DatasetStatistics { n_users: 2, n_items: 2 });
    }

    #[test]
    fn test_missing_semantic_id_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let train = vec![Interaction::new(1, 5, 1.0, 0)];
        for split in Split::ALL {
            write_interactions(&cfg.split_path(split), &train, &cfg.columns).unwrap();
        }
        write_semantic_ids(&cfg, 3);
        assert!(load_bundle(&cfg).is_err());
    }
}
