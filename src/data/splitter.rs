// ============================================================
// Layer 4 - Chronological Train/Valid/Test Splitter
// ============================================================
// Splits every user's history by time:
//   - Training set:   the oldest 70% of the user's interactions
//   - Validation set: the next 10%
//   - Test set:       the newest 20%
//
// Unlike a random split, nothing from a user's future leaks into
// their training prefix. There is no shuffling and no RNG: the
// output depends only on the records, so two runs over the same
// store give identical partitions.
//
// Boundaries are floor(0.7 n) and floor(0.8 n):
//   n = 10 → train 7, valid 1, test 2
//   n = 25 → train 17, valid 3, test 5
//
// Users with fewer than `min_interactions` records (10 by
// default) cannot be split meaningfully and are dropped from all
// three partitions. That is a filtering rule, not an error.
//
// Equal timestamps keep their original record order (stable sort).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::interaction::{Interaction, Split};

/// Ratios are cumulative cut points on each user's sorted history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// End of the training prefix, e.g. 0.7 → floor(0.7 n)
    pub train_ratio:      f64,
    /// End of the validation segment, e.g. 0.8 → floor(0.8 n)
    pub valid_ratio:      f64,
    /// Users with fewer interactions are dropped
    pub min_interactions: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { train_ratio: 0.7, valid_ratio: 0.8, min_interactions: 10 }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        let in_range = |r: f64| r > 0.0 && r <= 1.0;
        if !in_range(self.train_ratio) || !in_range(self.valid_ratio) {
            return Err(PipelineError::malformed(format!(
                "split ratios must lie in (0, 1], got train={} valid={}",
                self.train_ratio, self.valid_ratio
            )));
        }
        if self.train_ratio > self.valid_ratio {
            return Err(PipelineError::malformed(format!(
                "train_ratio ({}) must not exceed valid_ratio ({})",
                self.train_ratio, self.valid_ratio
            )));
        }
        if self.min_interactions == 0 {
            return Err(PipelineError::malformed("min_interactions must be at least 1"));
        }
        Ok(())
    }

    /// (train_end, valid_end) for a user with `n` interactions.
    /// Truncating `n * ratio` matches how the reference data was cut.
    pub fn boundaries(&self, n: usize) -> (usize, usize) {
        let train_end = ((n as f64) * self.train_ratio) as usize;
        let valid_end = ((n as f64) * self.valid_ratio) as usize;
        (train_end.min(n), valid_end.clamp(train_end.min(n), n))
    }
}

/// The three flat outputs, each the concatenation of per-user
/// segments in ascending user-id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub train: Vec<Interaction>,
    pub valid: Vec<Interaction>,
    pub test:  Vec<Interaction>,
    /// Users removed for having too few interactions
    pub dropped_users: usize,
}

impl Partition {
    pub fn records(&self, split: Split) -> &[Interaction] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test  => &self.test,
        }
    }

    /// Move one split's records out, leaving it empty
    pub fn take(&mut self, split: Split) -> Vec<Interaction> {
        match split {
            Split::Train => std::mem::take(&mut self.train),
            Split::Valid => std::mem::take(&mut self.valid),
            Split::Test  => std::mem::take(&mut self.test),
        }
    }

    /// (train, valid, test) record counts
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.train.len(), self.valid.len(), self.test.len())
    }
}

/// Splits interaction logs per user in chronological order.
#[derive(Debug, Clone, Default)]
pub struct ChronologicalSplitter {
    config: SplitConfig,
}

impl ChronologicalSplitter {
    pub fn new(config: SplitConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Partition `records` into train/valid/test.
    ///
    /// `dataset` only labels log lines. Empty input gives three
    /// empty outputs.
    pub fn split(&self, records: &[Interaction], dataset: &str) -> Partition {
        // Group by user, keeping source order inside each group.
        // BTreeMap gives a deterministic user-id order for the output.
        let mut by_user: BTreeMap<i64, Vec<Interaction>> = BTreeMap::new();
        for r in records {
            by_user.entry(r.user_id).or_default().push(*r);
        }

        let mut partition = Partition::default();

        for (user_id, mut history) in by_user {
            let n = history.len();
            if n < self.config.min_interactions {
                tracing::debug!(
                    "[{}] dropping user {}: {} interactions < {}",
                    dataset, user_id, n, self.config.min_interactions
                );
                partition.dropped_users += 1;
                continue;
            }

            // sort_by_key is stable, so ties keep source order
            history.sort_by_key(|r| r.timestamp);

            let (train_end, valid_end) = self.config.boundaries(n);
            let mut rest = history.split_off(train_end);
            let test = rest.split_off(valid_end - train_end);

            partition.train.extend(history);
            partition.valid.extend(rest);
            partition.test.extend(test);
        }

        let (train, valid, test) = partition.counts();
        let total = records.len().max(1);
        tracing::info!(
            "[{}] split: {} train, {} valid, {} test ({}% / {}% / {}%), {} users dropped",
            dataset,
            train,
            valid,
            test,
            train * 100 / total,
            valid * 100 / total,
            test * 100 / total,
            partition.dropped_users,
        );

        partition
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn user_history(user_id: i64, n: usize) -> Vec<Interaction> {
        (0..n)
            .map(|t| Interaction::new(user_id, 100 + t as i64, 1.0, t as i64))
            .collect()
    }

    fn splitter() -> ChronologicalSplitter {
        ChronologicalSplitter::new(SplitConfig::default()).unwrap()
    }

    #[test]
    fn test_ten_interactions_split_7_1_2() {
        let records = user_history(1, 10);
        let p = splitter().split(&records, "unit");

        let ts = |v: &[Interaction]| v.iter().map(|r| r.timestamp).collect::<Vec<_>>();
        assert_eq!(ts(&p.train), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(ts(&p.valid), vec![7]);
        assert_eq!(ts(&p.test), vec![8, 9]);
    }

    #[test]
    fn test_nine_interactions_are_dropped() {
        let mut records = user_history(1, 9);
        records.extend(user_history(2, 10));
        let p = splitter().split(&records, "unit");

        for split in Split::ALL {
            assert!(p.records(split).iter().all(|r| r.user_id != 1));
        }
        assert_eq!(p.dropped_users, 1);
        assert_eq!(p.counts(), (7, 1, 2));
    }

    #[test]
    fn test_segments_reconstruct_sorted_history() {
        // Shuffled timestamps for one user, n = 23
        let mut records: Vec<Interaction> = (0..23)
            .map(|i| Interaction::new(5, i, 1.0, (i * 7919) % 23))
            .collect();
        records.reverse();
        let p = splitter().split(&records, "unit");

        assert_eq!(p.train.len(), 16);
        assert_eq!(p.valid.len(), 18 - 16);
        assert_eq!(p.test.len(), 23 - 18);

        let mut expected = records.clone();
        expected.sort_by_key(|r| r.timestamp);
        let joined: Vec<Interaction> = p.train.iter()
            .chain(&p.valid)
            .chain(&p.test)
            .copied()
            .collect();
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_equal_timestamps_keep_source_order() {
        let records: Vec<Interaction> = (0..10)
            .map(|i| Interaction::new(1, i, 1.0, 42))
            .collect();
        let p = splitter().split(&records, "unit");
        let items: Vec<i64> = p.train.iter().chain(&p.valid).chain(&p.test)
            .map(|r| r.item_id)
            .collect();
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let mut records = user_history(3, 31);
        records.extend(user_history(1, 12));
        records.extend(user_history(2, 4));
        let s = splitter();
        assert_eq!(s.split(&records, "a"), s.split(&records, "a"));
    }

    #[test]
    fn test_output_in_user_order() {
        let mut records = user_history(9, 10);
        records.extend(user_history(2, 10));
        let p = splitter().split(&records, "unit");
        assert_eq!(p.train[0].user_id, 2);
        assert_eq!(p.train[7].user_id, 9);
    }

    #[test]
    fn test_empty_input() {
        let p = splitter().split(&[], "unit");
        assert_eq!(p, Partition::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = SplitConfig { train_ratio: 0.9, valid_ratio: 0.8, min_interactions: 10 };
        assert!(ChronologicalSplitter::new(bad).is_err());
        let bad = SplitConfig { train_ratio: 0.0, ..SplitConfig::default() };
        assert!(ChronologicalSplitter::new(bad).is_err());
        let bad = SplitConfig { min_interactions: 0, ..SplitConfig::default() };
        assert!(ChronologicalSplitter::new(bad).is_err());
    }

    #[test]
    fn test_take_moves_records_out() {
        let mut p = splitter().split(&user_history(1, 10), "unit");
        let train = p.take(Split::Train);
        assert_eq!(train.len(), 7);
        assert!(p.train.is_empty());
    }
}
