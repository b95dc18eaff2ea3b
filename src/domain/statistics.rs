// ============================================================
// Layer 3 - Dataset Statistics
// ============================================================
// {n_users, n_items} as seen by ONE dataset view. Train, valid
// and test views can disagree (an item may never appear in the
// test split), so anything that sizes item- or user-indexed
// parameters must reconcile them first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::interaction::Interaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub n_users: usize,
    pub n_items: usize,
}

impl DatasetStatistics {
    /// Count distinct user and item ids in a set of interactions.
    pub fn from_interactions(records: &[Interaction]) -> Self {
        let users: HashSet<i64> = records.iter().map(|r| r.user_id).collect();
        let items: HashSet<i64> = records.iter().map(|r| r.item_id).collect();
        Self { n_users: users.len(), n_items: items.len() }
    }

    /// Element-wise maximum across several views.
    pub fn reconcile<'a, I>(stats: I) -> Self
    where
        I: IntoIterator<Item = &'a DatasetStatistics>,
    {
        stats.into_iter().fold(Self::default(), |acc, s| Self {
            n_users: acc.n_users.max(s.n_users),
            n_items: acc.n_items.max(s.n_items),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_distinct_ids() {
        let records = vec![
            Interaction::new(1, 10, 5.0, 0),
            Interaction::new(1, 11, 4.0, 1),
            Interaction::new(2, 10, 3.0, 2),
        ];
        let s = DatasetStatistics::from_interactions(&records);
        assert_eq!(s, DatasetStatistics { n_users: 2, n_items: 2 });
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(DatasetStatistics::from_interactions(&[]), DatasetStatistics::default());
    }

    #[test]
    fn test_reconcile_takes_maximum() {
        let a = DatasetStatistics { n_users: 5, n_items: 20 };
        let b = DatasetStatistics { n_users: 7, n_items: 12 };
        let r = DatasetStatistics::reconcile([&a, &b]);
        assert_eq!(r, DatasetStatistics { n_users: 7, n_items: 20 });
    }
}
