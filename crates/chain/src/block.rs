//! Block ledger entries.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// One committed rollup block: the Merkle root over its encoded
/// transitions and how many there were. A pruned block is zeroed in place
/// rather than removed, so ledger indices never shift.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub root_hash: B256,
    pub block_size: u64,
}

impl BlockEntry {
    pub fn new(root_hash: B256, block_size: u64) -> Self {
        Self {
            root_hash,
            block_size,
        }
    }

    /// Whether this entry was pruned. No live block has a zero root: even
    /// an empty batch commits to the hash of the empty byte string.
    pub fn is_tombstone(&self) -> bool {
        self.root_hash == B256::ZERO
    }

    /// Prune in place.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
