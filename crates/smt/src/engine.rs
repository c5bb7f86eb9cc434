//! Stateful proof-replay engine.
//!
//! During a fraud proof the chain re-derives a post-state root from storage
//! witnesses: every touched slot is first proven against the asserted
//! pre-state root with [`ProofEngine::verify_and_store`], which caches the
//! proven path, then mutated with [`ProofEngine::update_leaf`], which
//! recomputes the root from the cache. Updating a slot whose path was never
//! proven is an error, not a silent recompute.

use std::collections::HashMap;

use alloy_primitives::B256;
use thiserror::Error;

use crate::hasher::Keccak256Hasher;
use crate::proof::compute_root;

/// Merkle engine failures. All of them indicate a bad witness or a protocol
/// violation by the caller, never detected fraud.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SmtError {
    #[error("sibling count {got} does not match tree height {height}")]
    WrongPathLength { got: usize, height: usize },
    #[error("slot {slot_index} does not fit in a tree of height {height}")]
    SlotOutOfRange { slot_index: u32, height: usize },
    #[error("slot {slot_index} does not hash up to the current root")]
    RootMismatch { slot_index: u32 },
    #[error("slot {slot_index} has no verified sibling at level {level}")]
    UnverifiedPath { slot_index: u32, level: usize },
}

/// Node cache key: (level above the leaves, node index within that level).
type NodeKey = (usize, u64);

/// Replays storage witnesses against a claimed root and recomputes the root
/// after leaf updates. Scratch state persists between calls but is wiped by
/// [`ProofEngine::reset`] at the start of every proof session.
#[derive(Clone, Debug)]
pub struct ProofEngine {
    root: B256,
    height: usize,
    nodes: HashMap<NodeKey, B256>,
}

impl ProofEngine {
    pub fn new(root: B256, height: usize) -> Self {
        Self {
            root,
            height,
            nodes: HashMap::new(),
        }
    }

    /// Reinitialize for a new proof session: install the claimed root and
    /// drop every cached node from the previous session.
    pub fn reset(&mut self, root: B256, height: usize) {
        self.root = root;
        self.height = height;
        self.nodes.clear();
    }

    /// Current root.
    pub fn root(&self) -> B256 {
        self.root
    }

    /// Verify that `leaf_bytes` occupies `slot_index` under the current
    /// root, then cache the whole proven path so the slot can be updated.
    pub fn verify_and_store(
        &mut self,
        leaf_bytes: &[u8],
        slot_index: u32,
        siblings: &[B256],
    ) -> Result<(), SmtError> {
        self.check_slot(slot_index)?;
        if siblings.len() != self.height {
            return Err(SmtError::WrongPathLength {
                got: siblings.len(),
                height: self.height,
            });
        }
        if compute_root(Keccak256Hasher::hash(leaf_bytes), slot_index, siblings) != self.root {
            return Err(SmtError::RootMismatch { slot_index });
        }

        let mut current = Keccak256Hasher::hash(leaf_bytes);
        let mut idx = slot_index as u64;
        for (level, sibling) in siblings.iter().enumerate() {
            self.nodes.insert((level, idx), current);
            self.nodes.insert((level, idx ^ 1), *sibling);
            current = if idx & 1 == 1 {
                Keccak256Hasher::hash_pair(sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, sibling)
            };
            idx >>= 1;
        }
        Ok(())
    }

    /// Replace the leaf at `slot_index` and recompute the root along the
    /// cached path. Legal only once the slot's path is populated, normally
    /// by a prior [`Self::verify_and_store`] at the same index.
    pub fn update_leaf(&mut self, new_leaf_hash: B256, slot_index: u32) -> Result<(), SmtError> {
        self.check_slot(slot_index)?;

        // Walk first so a failure midway leaves the cache untouched.
        let mut idx = slot_index as u64;
        for level in 0..self.height {
            if !self.nodes.contains_key(&(level, idx ^ 1)) {
                return Err(SmtError::UnverifiedPath { slot_index, level });
            }
            idx >>= 1;
        }

        let mut current = new_leaf_hash;
        let mut idx = slot_index as u64;
        for level in 0..self.height {
            self.nodes.insert((level, idx), current);
            let sibling = self.nodes[&(level, idx ^ 1)];
            current = if idx & 1 == 1 {
                Keccak256Hasher::hash_pair(&sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, &sibling)
            };
            idx >>= 1;
        }
        self.root = current;
        Ok(())
    }

    fn check_slot(&self, slot_index: u32) -> Result<(), SmtError> {
        if self.height < 32 && (slot_index as u64) >> self.height != 0 {
            return Err(SmtError::SlotOutOfRange {
                slot_index,
                height: self.height,
            });
        }
        Ok(())
    }
}
