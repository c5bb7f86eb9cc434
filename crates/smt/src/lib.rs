//! Sparse Merkle tree machinery for the token rollup.
//!
//! Two tree shapes share one hashing discipline (keccak256 nodes):
//! - the fixed-height state tree over account storage slots, served by
//!   [`SparseMerkleTree`] (witness generation) and [`ProofEngine`]
//!   (witness replay during fraud proofs);
//! - the per-block transitions tree, served by the stateless
//!   [`transitions_root`] / [`transitions_proof`] / [`verify`] functions.

mod engine;
mod hasher;
mod proof;
mod tree;

pub use engine::{ProofEngine, SmtError};
pub use hasher::Keccak256Hasher;
pub use proof::{transitions_proof, transitions_root, verify};
pub use tree::SparseMerkleTree;

use alloy_primitives::B256;

/// keccak256 of the empty byte string. Pads transitions trees to a power of
/// two and commits to an empty batch.
pub const EMPTY_HASH: B256 = B256::new([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2,
    0xdc, 0xc7, 0x03, 0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b,
    0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Height of the account state tree. Slot indices are `u32`, one bit per
/// level, least significant bit at the leaf level.
pub const STATE_TREE_HEIGHT: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hash_constant_matches_keccak() {
        assert_eq!(Keccak256Hasher::hash(&[]), EMPTY_HASH);
    }
}
