use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a lorebook entry, independent of its position.
/// 條目的穩定識別碼，與其排列位置無關。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryUid(u64);

impl EntryUid {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for EntryUid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Returns the smallest uid absent from `existing`.
/// 回傳 `existing` 中尚未使用的最小識別碼。
///
/// Callers must collect `existing` from the live collection right before the
/// call; a set computed before a mutation can hand out a colliding uid.
pub fn next_uid(existing: &BTreeSet<EntryUid>) -> EntryUid {
    let mut candidate = 0u64;
    for uid in existing {
        match uid.0.cmp(&candidate) {
            std::cmp::Ordering::Less => continue,
            std::cmp::Ordering::Equal => candidate += 1,
            std::cmp::Ordering::Greater => break,
        }
    }
    EntryUid(candidate)
}
