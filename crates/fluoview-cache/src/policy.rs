//! Retention policies.

use serde::{Deserialize, Serialize};

/// How many scenes the cache keeps resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "count")]
pub enum RetentionPolicy {
    /// Cache nothing; every store clears the cache.
    None,
    /// Only the scene being stored survives.
    Current,
    /// The `n` most recently used scenes survive.
    Recent(usize),
    /// Unbounded; only memory pressure evicts.
    All,
}

impl RetentionPolicy {
    /// Default window for `Recent`.
    pub const DEFAULT_RECENT: usize = 5;

    pub fn recent() -> Self {
        Self::Recent(Self::DEFAULT_RECENT)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::Current
    }
}
