// ============================================================
// Layer 4 - Interaction Dataset (one view per split)
// ============================================================
// Wraps ONE split's interaction records and turns each record
// into a training example on demand:
//
//   record (user, item, feedback, t)
//       │  + semantic id of `item`
//       │  + the user's train-split items strictly before t
//       ▼
//   RecSample
//
// Train, valid and test views are the same type; only the
// records (and the `Split` tag) differ. The history context is
// always taken from the TRAIN partition, so validation and test
// examples see the user's full training prefix but never other
// held-out interactions.
//
// Everything a view needs is checked when it is built: if any
// item (in the records or in a history) lacks a semantic id the
// view is not created. After that `get` cannot fail, which is
// what burn's `Dataset` trait expects.
//
// The view is immutable; the semantic-id table and the user
// histories are shared through `Arc` between all three views
// and the DataLoader workers.

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::data::collate::{Array, Record};
use crate::data::semantic_ids::SemanticIdTable;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::interaction::{Interaction, Split};
use crate::domain::statistics::DatasetStatistics;

// ─── UserHistory ──────────────────────────────────────────────────────────────
/// Per-user training interactions in chronological order.
#[derive(Debug, Clone, Default)]
pub struct UserHistory {
    by_user: HashMap<i64, Vec<Interaction>>,
}

impl UserHistory {
    /// Group train-split records by user and sort each group by time.
    /// Stable sort, so equal timestamps keep record order.
    pub fn from_train(records: &[Interaction]) -> Self {
        let mut by_user: HashMap<i64, Vec<Interaction>> = HashMap::new();
        for r in records {
            by_user.entry(r.user_id).or_default().push(*r);
        }
        for history in by_user.values_mut() {
            history.sort_by_key(|r| r.timestamp);
        }
        Self { by_user }
    }

    /// The user's train interactions with timestamp < `before`.
    pub fn prefix(&self, user_id: i64, before: i64) -> &[Interaction] {
        match self.by_user.get(&user_id) {
            Some(history) => {
                let end = history.partition_point(|r| r.timestamp < before);
                &history[..end]
            }
            None => &[],
        }
    }

    fn items(&self) -> impl Iterator<Item = i64> + '_ {
        self.by_user.values().flatten().map(|r| r.item_id)
    }
}

// ─── RecSample ────────────────────────────────────────────────────────────────
/// One training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecSample {
    pub user_id:       i64,
    pub item_id:       i64,
    /// Semantic id of `item_id`, `length` codes
    pub semantic_ids:  Vec<u32>,
    pub feedback:      f32,
    /// `history_len * length` codes, oldest history item first,
    /// left-padded with zeros
    pub history_codes: Vec<u32>,
    /// 1.0 for a real history slot, 0.0 for padding
    pub history_mask:  Vec<f32>,
}

impl RecSample {
    /// Number of real (unpadded) history items
    pub fn history_count(&self) -> usize {
        self.history_mask.iter().filter(|&&m| m > 0.0).count()
    }

    /// Key → array form consumed by the collator.
    pub fn to_record(&self) -> Record {
        let sid_len = self.semantic_ids.len();
        let history_len = self.history_mask.len();
        let ints = |v: &[u32]| v.iter().map(|&c| c as i64).collect::<Vec<_>>();

        Record::mapping([
            ("user_id",       Array::int(self.user_id)),
            ("item_id",       Array::int(self.item_id)),
            ("semantic_ids",  Array::ints(ints(&self.semantic_ids))),
            ("feedback",      Array::float(self.feedback)),
            ("history_codes", Array::int_tensor(vec![history_len, sid_len], ints(&self.history_codes))),
            ("history_mask",  Array::floats(self.history_mask.clone())),
        ])
    }
}

// ─── InteractionDataset ───────────────────────────────────────────────────────
pub struct InteractionDataset {
    split:       Split,
    records:     Vec<Interaction>,
    semantic:    Arc<SemanticIdTable>,
    history:     Arc<UserHistory>,
    history_len: usize,
    stats:       DatasetStatistics,
}

impl InteractionDataset {
    /// Build a view over one split.
    ///
    /// Fails with `KeyNotFound` if any referenced item has no
    /// semantic id.
    pub fn new(
        split:       Split,
        records:     Vec<Interaction>,
        semantic:    Arc<SemanticIdTable>,
        history:     Arc<UserHistory>,
        history_len: usize,
    ) -> PipelineResult<Self> {
        let missing = records
            .iter()
            .map(|r| r.item_id)
            .chain(history.items())
            .find(|&item| !semantic.contains(item));
        if let Some(item_id) = missing {
            tracing::error!("[{}] item {} has no semantic id", split, item_id);
            return Err(PipelineError::KeyNotFound { item_id });
        }

        let stats = DatasetStatistics::from_interactions(&records);
        tracing::debug!(
            "[{}] view: {} records, {} users, {} items",
            split, records.len(), stats.n_users, stats.n_items
        );

        Ok(Self { split, records, semantic, history, history_len, stats })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// Distinct users/items in THIS view's records
    pub fn get_statistics(&self) -> DatasetStatistics {
        self.stats
    }

    pub fn records(&self) -> &[Interaction] {
        &self.records
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn semantic_table(&self) -> &SemanticIdTable {
        &self.semantic
    }

    /// Build the example for `index`, reporting what went wrong.
    pub fn try_get(&self, index: usize) -> PipelineResult<RecSample> {
        let record = self.records.get(index).ok_or_else(|| {
            PipelineError::malformed(format!(
                "index {} out of range for {} view of length {}",
                index, self.split, self.records.len()
            ))
        })?;

        let semantic_ids = self.semantic.lookup(record.item_id)?.to_vec();
        let (history_codes, history_mask) = self.history_context(record)?;

        Ok(RecSample {
            user_id: record.user_id,
            item_id: record.item_id,
            semantic_ids,
            feedback: record.feedback as f32,
            history_codes,
            history_mask,
        })
    }

    /// Codes and mask of the last `history_len` train items before
    /// this record, computed on every call.
    fn history_context(&self, record: &Interaction) -> PipelineResult<(Vec<u32>, Vec<f32>)> {
        let sid_len = self.semantic.length();
        let prefix = self.history.prefix(record.user_id, record.timestamp);
        let recent = &prefix[prefix.len().saturating_sub(self.history_len)..];
        let padding = self.history_len - recent.len();

        let mut codes = vec![0u32; padding * sid_len];
        let mut mask = vec![0.0f32; padding];
        for past in recent {
            codes.extend_from_slice(self.semantic.lookup(past.item_id)?);
            mask.push(1.0);
        }
        Ok((codes, mask))
    }
}

impl Dataset<RecSample> for InteractionDataset {
    fn get(&self, index: usize) -> Option<RecSample> {
        // Lookups were validated at construction, so only an
        // out-of-range index yields None here
        self.try_get(index).ok()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
