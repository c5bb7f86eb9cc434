//! Sparse Merkle tree over integer slot indices.
//!
//! This is the witness-producing side of the state commitment: operators
//! (and the test suite) maintain it to derive roots and sibling paths that
//! the on-chain [`crate::ProofEngine`] then replays. Unpopulated subtrees
//! hash to a per-level default chain seeded from the empty-leaf hash.

use std::collections::HashMap;

use alloy_primitives::B256;

use crate::hasher::Keccak256Hasher;

/// Fixed-height sparse Merkle tree storing leaf hashes.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    height: usize,
    leaves: HashMap<u64, B256>,
    /// `defaults[level]` is the hash of an empty subtree rooted at `level`;
    /// `defaults[0]` is the empty-leaf hash.
    defaults: Vec<B256>,
}

impl SparseMerkleTree {
    /// Create an empty tree. `empty_leaf_hash` is the hash every
    /// unpopulated leaf carries.
    pub fn new(height: usize, empty_leaf_hash: B256) -> Self {
        let mut defaults = Vec::with_capacity(height + 1);
        defaults.push(empty_leaf_hash);
        for level in 0..height {
            let below = defaults[level];
            defaults.push(Keccak256Hasher::hash_pair(&below, &below));
        }
        Self {
            height,
            leaves: HashMap::new(),
            defaults,
        }
    }

    /// Install a leaf hash at `slot_index`. Roots and proofs are computed
    /// on demand, so inserts are cheap.
    pub fn insert(&mut self, slot_index: u32, leaf_hash: B256) {
        self.leaves.insert(slot_index as u64, leaf_hash);
    }

    /// Current root.
    pub fn root(&self) -> B256 {
        let mut nodes = self.leaves.clone();
        for level in 0..self.height {
            nodes = self.level_up(&nodes, level);
        }
        nodes
            .get(&0)
            .copied()
            .unwrap_or(self.defaults[self.height])
    }

    /// Sibling path (leaf to root) for `slot_index`, valid whether or not
    /// the slot is populated.
    pub fn proof(&self, slot_index: u32) -> Vec<B256> {
        let mut siblings = Vec::with_capacity(self.height);
        let mut nodes = self.leaves.clone();
        let mut idx = slot_index as u64;
        for level in 0..self.height {
            siblings.push(
                nodes
                    .get(&(idx ^ 1))
                    .copied()
                    .unwrap_or(self.defaults[level]),
            );
            nodes = self.level_up(&nodes, level);
            idx >>= 1;
        }
        siblings
    }

    fn level_up(&self, nodes: &HashMap<u64, B256>, level: usize) -> HashMap<u64, B256> {
        let mut parents = HashMap::with_capacity(nodes.len());
        for (&idx, &hash) in nodes {
            let parent = idx >> 1;
            if parents.contains_key(&parent) {
                continue;
            }
            let sibling = nodes
                .get(&(idx ^ 1))
                .copied()
                .unwrap_or(self.defaults[level]);
            let digest = if idx & 1 == 0 {
                Keccak256Hasher::hash_pair(&hash, &sibling)
            } else {
                Keccak256Hasher::hash_pair(&sibling, &hash)
            };
            parents.insert(parent, digest);
        }
        parents
    }
}
