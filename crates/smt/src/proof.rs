//! Transitions-tree hashing and stateless inclusion verification.
//!
//! The transitions tree commits a block's encoded transitions under one
//! root. Canonical construction, which operators must reproduce bit-exact:
//! each leaf is `keccak256(transition_bytes)`, the hashed-leaf list is
//! padded to the next power of two with [`EMPTY_HASH`], and parents are
//! `keccak256(left || right)`. An empty batch commits to `EMPTY_HASH`
//! itself. Bit `i` of a leaf index (least significant first) selects the
//! side at level `i`.

use alloy_primitives::{Bytes, B256};

use crate::hasher::Keccak256Hasher;
use crate::EMPTY_HASH;

/// Root of the transitions tree over the given encoded transitions.
pub fn transitions_root(leaves: &[Bytes]) -> B256 {
    if leaves.is_empty() {
        return EMPTY_HASH;
    }
    let mut level: Vec<B256> = leaves.iter().map(|l| Keccak256Hasher::hash(l)).collect();
    level.resize(level.len().next_power_of_two(), EMPTY_HASH);
    while level.len() > 1 {
        level = reduce(&level);
    }
    level[0]
}

/// Sibling path (leaf to root) proving `leaves[index]` against
/// [`transitions_root`]. `None` when `index` is out of range.
pub fn transitions_proof(leaves: &[Bytes], index: u32) -> Option<Vec<B256>> {
    if index as usize >= leaves.len() {
        return None;
    }
    let mut level: Vec<B256> = leaves.iter().map(|l| Keccak256Hasher::hash(l)).collect();
    level.resize(level.len().next_power_of_two(), EMPTY_HASH);

    let mut siblings = Vec::new();
    let mut idx = index as usize;
    while level.len() > 1 {
        siblings.push(level[idx ^ 1]);
        level = reduce(&level);
        idx >>= 1;
    }
    Some(siblings)
}

/// Stateless inclusion check: fold `keccak256(leaf_bytes)` up the sibling
/// path and compare with `root`. The path length fixes the tree height, so
/// `index` must fit in `siblings.len()` bits.
pub fn verify(root: B256, leaf_bytes: &[u8], index: u32, siblings: &[B256]) -> bool {
    if siblings.len() < 32 && (index as u64) >> siblings.len() != 0 {
        return false;
    }
    compute_root(Keccak256Hasher::hash(leaf_bytes), index, siblings) == root
}

/// Fold a leaf hash up a sibling path.
pub(crate) fn compute_root(leaf_hash: B256, index: u32, siblings: &[B256]) -> B256 {
    let mut current = leaf_hash;
    let mut idx = index as u64;
    for sibling in siblings {
        current = if idx & 1 == 1 {
            Keccak256Hasher::hash_pair(sibling, &current)
        } else {
            Keccak256Hasher::hash_pair(&current, sibling)
        };
        idx >>= 1;
    }
    current
}

fn reduce(level: &[B256]) -> Vec<B256> {
    level
        .chunks(2)
        .map(|pair| Keccak256Hasher::hash_pair(&pair[0], &pair[1]))
        .collect()
}
