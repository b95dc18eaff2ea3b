// ============================================================
// Layer 4 - Semantic ID Table
// ============================================================
// Every item is represented by a fixed-length tuple of discrete
// codes ("semantic id"), e.g. 16 codes each in [0, 256). Items
// that are similar share code prefixes, which is what lets the
// model generalise beyond raw item indices.
//
// The codes are produced elsewhere (a quantiser, or the seeded
// generator in `synthetic`). This table only stores and serves
// them, with two guarantees:
//   1. Every row has exactly `length` codes, each < codebook_size.
//      Checked once at construction.
//   2. Looking up an unknown item is an error. A zero-filled
//      default would silently train the model on garbage.
//
// On disk the table is a rectangular array keyed by item index:
//   { "length": 16, "codebook_size": 256, "codes": [[..], [..], ...] }
// Row i holds the codes of item i.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use crate::domain::error::{PipelineError, PipelineResult};

/// Shape of the semantic-id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticIdConfig {
    /// Codes per item
    pub length:        usize,
    /// Every code lies in [0, codebook_size)
    pub codebook_size: u32,
}

impl Default for SemanticIdConfig {
    fn default() -> Self {
        Self { length: 16, codebook_size: 256 }
    }
}

/// Persisted form: rows keyed by item index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SemanticIdFile {
    length:        usize,
    codebook_size: u32,
    codes:         Vec<Vec<u32>>,
}

/// Read-only item → code-sequence lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticIdTable {
    config: SemanticIdConfig,
    /// item id → row position in `codes`
    index:  HashMap<i64, usize>,
    /// Row-major, `index.len() * config.length` codes
    codes:  Vec<u32>,
    /// Row position → item id, for writing back in item order
    items:  Vec<i64>,
}

impl SemanticIdTable {
    /// Build from a rectangular array where row `i` belongs to item `i`.
    pub fn from_rows(config: SemanticIdConfig, rows: Vec<Vec<u32>>) -> PipelineResult<Self> {
        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| (i as i64, row));
        Self::build(config, entries)
    }

    /// Build from an explicit item id → codes mapping.
    pub fn from_mapping(config: SemanticIdConfig, mapping: HashMap<i64, Vec<u32>>) -> PipelineResult<Self> {
        // Sorted so the row layout does not depend on hash order
        let mut entries: Vec<(i64, Vec<u32>)> = mapping.into_iter().collect();
        entries.sort_by_key(|(item, _)| *item);
        Self::build(config, entries)
    }

    fn build<I>(config: SemanticIdConfig, entries: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (i64, Vec<u32>)>,
    {
        if config.length == 0 || config.codebook_size == 0 {
            return Err(PipelineError::malformed(format!(
                "semantic id length and codebook size must be positive, got {} and {}",
                config.length, config.codebook_size
            )));
        }

        let mut index = HashMap::new();
        let mut codes = Vec::new();
        let mut items = Vec::new();

        for (item_id, row) in entries {
            if row.len() != config.length {
                return Err(PipelineError::malformed(format!(
                    "item {}: expected {} codes, found {}",
                    item_id, config.length, row.len()
                )));
            }
            if let Some(&code) = row.iter().find(|&&c| c >= config.codebook_size) {
                return Err(PipelineError::malformed(format!(
                    "item {}: code {} outside codebook [0, {})",
                    item_id, code, config.codebook_size
                )));
            }
            if index.insert(item_id, items.len()).is_some() {
                return Err(PipelineError::malformed(format!(
                    "item {} has more than one semantic id",
                    item_id
                )));
            }
            items.push(item_id);
            codes.extend(row);
        }

        Ok(Self { config, index, codes, items })
    }

    /// Codes for `item_id`, or `KeyNotFound`.
    pub fn lookup(&self, item_id: i64) -> PipelineResult<&[u32]> {
        let row = *self
            .index
            .get(&item_id)
            .ok_or(PipelineError::KeyNotFound { item_id })?;
        let start = row * self.config.length;
        Ok(&self.codes[start..start + self.config.length])
    }

    pub fn contains(&self, item_id: i64) -> bool {
        self.index.contains_key(&item_id)
    }

    pub fn config(&self) -> SemanticIdConfig {
        self.config
    }

    pub fn length(&self) -> usize {
        self.config.length
    }

    pub fn codebook_size(&self) -> u32 {
        self.config.codebook_size
    }

    /// Number of items with a semantic id
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Save as a rectangular JSON array.
    ///
    /// Only tables whose item ids are exactly 0..len can be stored
    /// this way, since the row position is the item id.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by_key(|&row| self.items[row]);

        let rows: Vec<Vec<u32>> = order
            .iter()
            .enumerate()
            .map(|(expected, &row)| {
                anyhow::ensure!(
                    self.items[row] == expected as i64,
                    "item ids are not contiguous from 0 (found {} at row {})",
                    self.items[row],
                    expected
                );
                let start = row * self.config.length;
                Ok(self.codes[start..start + self.config.length].to_vec())
            })
            .collect::<Result<_>>()?;

        let file = SemanticIdFile {
            length:        self.config.length,
            codebook_size: self.config.codebook_size,
            codes:         rows,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }
        fs::write(path, serde_json::to_string(&file)?)
            .with_context(|| format!("Cannot write semantic ids to '{}'", path.display()))?;

        tracing::debug!("Saved {} semantic ids to '{}'", self.len(), path.display());
        Ok(())
    }

    /// Load a table written by `save`, validating its shape.
    ///
    /// `expected` pins the shape the caller was configured with; a
    /// file produced for a different id length is rejected here.
    pub fn load(path: &Path, expected: Option<SemanticIdConfig>) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read semantic ids from '{}'", path.display()))?;
        let file: SemanticIdFile = serde_json::from_str(&json)
            .with_context(|| format!("Invalid semantic id file '{}'", path.display()))?;

        let config = SemanticIdConfig {
            length:        file.length,
            codebook_size: file.codebook_size,
        };
        if let Some(expected) = expected {
            if expected != config {
                return Err(PipelineError::malformed(format!(
                    "semantic id file '{}' has shape {:?}, expected {:?}",
                    path.display(),
                    config,
                    expected
                ))
                .into());
            }
        }

        let table = Self::from_rows(config, file.codes)
            .with_context(|| format!("Invalid semantic id file '{}'", path.display()))?;
        tracing::info!(
            "Loaded {} semantic ids (length {}, codebook {}) from '{}'",
            table.len(),
            table.length(),
            table.codebook_size(),
            path.display()
        );
        Ok(table)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SemanticIdConfig {
        SemanticIdConfig { length: 3, codebook_size: 8 }
    }

    #[test]
    fn test_lookup_by_row_index() {
        let table = SemanticIdTable::from_rows(small(), vec![vec![0, 1, 2], vec![7, 7, 0]]).unwrap();
        assert_eq!(table.lookup(0).unwrap(), &[0, 1, 2]);
        assert_eq!(table.lookup(1).unwrap(), &[7, 7, 0]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_item_is_key_not_found() {
        let table = SemanticIdTable::from_rows(small(), vec![vec![0, 1, 2]]).unwrap();
        let err = table.lookup(99).unwrap_err();
        assert!(matches!(err, PipelineError::KeyNotFound { item_id: 99 }));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = SemanticIdTable::from_rows(small(), vec![vec![0, 1]]).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_code_outside_codebook_rejected() {
        let err = SemanticIdTable::from_rows(small(), vec![vec![0, 1, 8]]).unwrap_err();
        assert!(err.to_string().contains("outside codebook"));
    }

    #[test]
    fn test_from_mapping_sparse_ids() {
        let mapping = HashMap::from([(40, vec![1, 2, 3]), (7, vec![4, 5, 6])]);
        let table = SemanticIdTable::from_mapping(small(), mapping).unwrap();
        assert_eq!(table.lookup(40).unwrap(), &[1, 2, 3]);
        assert_eq!(table.lookup(7).unwrap(), &[4, 5, 6]);
        assert!(!table.contains(0));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        let rows: Vec<Vec<u32>> = (0..20).map(|i| vec![i % 8, (i * 3) % 8, (i * 5) % 8]).collect();
        let table = SemanticIdTable::from_rows(small(), rows).unwrap();

        table.save(&path).unwrap();
        let loaded = SemanticIdTable::load(&path, Some(small())).unwrap();

        for item in 0..20 {
            assert_eq!(loaded.lookup(item).unwrap(), table.lookup(item).unwrap());
        }
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_load_rejects_unexpected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        SemanticIdTable::from_rows(small(), vec![vec![0, 0, 0]])
            .unwrap()
            .save(&path)
            .unwrap();

        let other = SemanticIdConfig { length: 16, codebook_size: 256 };
        assert!(SemanticIdTable::load(&path, Some(other)).is_err());
    }

    #[test]
    fn test_save_requires_contiguous_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = HashMap::from([(3, vec![1, 2, 3])]);
        let table = SemanticIdTable::from_mapping(small(), mapping).unwrap();
        assert!(table.save(&dir.path().join("ids.json")).is_err());
    }
}
