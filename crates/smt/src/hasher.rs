//! Keccak256 hashing for tree nodes.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hasher.
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash arbitrary bytes.
    pub fn hash(data: &[u8]) -> B256 {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        B256::new(output)
    }

    /// Hash two child digests into their parent.
    pub fn hash_pair(left: &B256, right: &B256) -> B256 {
        let mut hasher = Keccak::v256();
        hasher.update(left.as_slice());
        hasher.update(right.as_slice());
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        B256::new(output)
    }
}
