// ============================================================
// Layer 3 - Interaction Domain Type
// ============================================================
// One observed feedback event. Records are immutable once
// loaded: the splitter reorders references to them but never
// edits a field.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One (user, item) feedback event with a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id:   i64,
    pub item_id:   i64,
    /// Rating or implicit feedback value (1.0 when the source has none)
    pub feedback:  f64,
    pub timestamp: i64,
}

impl Interaction {
    pub fn new(user_id: i64, item_id: i64, feedback: f64, timestamp: i64) -> Self {
        Self { user_id, item_id, feedback, timestamp }
    }
}

/// Which partition a dataset view serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// File-name suffix used when partitions are written to disk
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test  => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
