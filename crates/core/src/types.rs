//! Account leaves, storage slots, and inclusion-proof containers.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};
use rollup_smt::Keccak256Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical encoding of an uninhabited storage slot.
pub const EMPTY_SLOT_ENCODING: [u8; 32] = [0u8; 32];

sol! {
    /// ABI layout of an inhabited account leaf.
    struct AccountLeaf {
        address account;
        uint256[] balances;
        uint256[] transferNonces;
        uint256[] withdrawNonces;
    }
}

/// Decode failures. The adjudicator treats these as proof of fraud when
/// they come from a committed transition, so decoding must never panic.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("account leaf bytes are not a canonical encoding")]
    MalformedAccount,
    #[error("transition bytes are not a canonical encoding")]
    MalformedTransition,
    #[error("unknown transition type {0}")]
    UnknownTransitionType(U256),
    #[error("slot index does not fit the state tree")]
    SlotIndexOverflow,
}

/// One account's sidechain state: token balances and the two independent
/// nonce sequences, all indexed by token registry index.
///
/// The three sequences are parallel: any mutation touching token `t` first
/// grows all three to `t + 1` entries (zero-filled), so equal states always
/// share one canonical encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account: Address,
    pub balances: Vec<U256>,
    pub transfer_nonces: Vec<U256>,
    pub withdraw_nonces: Vec<U256>,
}

impl AccountInfo {
    /// A fresh, inhabited account with empty sequences.
    pub fn with_account(account: Address) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }

    /// Whether this is the uninhabited slot value.
    pub fn is_empty(&self) -> bool {
        self.account.is_zero()
            && self.balances.is_empty()
            && self.transfer_nonces.is_empty()
            && self.withdraw_nonces.is_empty()
    }

    /// Canonical encoding: the 32-byte zero word for an uninhabited slot,
    /// the ABI tuple otherwise. Sidechain clients must reproduce this
    /// bit-exact or their storage witnesses will not verify.
    pub fn encode(&self) -> Bytes {
        if self.is_empty() {
            return EMPTY_SLOT_ENCODING.to_vec().into();
        }
        let leaf = AccountLeaf {
            account: self.account,
            balances: self.balances.clone(),
            transferNonces: self.transfer_nonces.clone(),
            withdrawNonces: self.withdraw_nonces.clone(),
        };
        leaf.abi_encode().into()
    }

    /// Inverse of [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes == EMPTY_SLOT_ENCODING {
            return Ok(Self::default());
        }
        let leaf =
            AccountLeaf::abi_decode(bytes, true).map_err(|_| CodecError::MalformedAccount)?;
        Ok(Self {
            account: leaf.account,
            balances: leaf.balances,
            transfer_nonces: leaf.transferNonces,
            withdraw_nonces: leaf.withdrawNonces,
        })
    }

    /// State-tree leaf hash of this value.
    pub fn leaf_hash(&self) -> B256 {
        Keccak256Hasher::hash(&self.encode())
    }

    pub fn balance(&self, token_index: u32) -> U256 {
        self.balances
            .get(token_index as usize)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn transfer_nonce(&self, token_index: u32) -> U256 {
        self.transfer_nonces
            .get(token_index as usize)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn withdraw_nonce(&self, token_index: u32) -> U256 {
        self.withdraw_nonces
            .get(token_index as usize)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Add `amount` to the token's balance.
    pub fn credit(&mut self, token_index: u32, amount: U256) {
        self.grow_to(token_index);
        let slot = &mut self.balances[token_index as usize];
        *slot = slot.saturating_add(amount);
    }

    /// Subtract `amount` from the token's balance; `false` on underflow.
    #[must_use]
    pub fn debit(&mut self, token_index: u32, amount: U256) -> bool {
        self.grow_to(token_index);
        let slot = &mut self.balances[token_index as usize];
        match slot.checked_sub(amount) {
            Some(rest) => {
                *slot = rest;
                true
            }
            None => false,
        }
    }

    pub fn bump_transfer_nonce(&mut self, token_index: u32) {
        self.grow_to(token_index);
        let slot = &mut self.transfer_nonces[token_index as usize];
        *slot = slot.saturating_add(U256::from(1));
    }

    pub fn bump_withdraw_nonce(&mut self, token_index: u32) {
        self.grow_to(token_index);
        let slot = &mut self.withdraw_nonces[token_index as usize];
        *slot = slot.saturating_add(U256::from(1));
    }

    fn grow_to(&mut self, token_index: u32) {
        let len = token_index as usize + 1;
        if self.balances.len() < len {
            self.balances.resize(len, U256::ZERO);
        }
        if self.transfer_nonces.len() < len {
            self.transfer_nonces.resize(len, U256::ZERO);
        }
        if self.withdraw_nonces.len() < len {
            self.withdraw_nonces.resize(len, U256::ZERO);
        }
    }
}

/// A position in the state tree together with its account value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSlot {
    pub slot_index: u32,
    pub value: AccountInfo,
}

/// Merkle path anchoring an encoded transition inside a committed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInclusionProof {
    pub block_number: u64,
    pub transition_index: u32,
    pub siblings: Vec<B256>,
}

/// An encoded transition plus the proof of where it was committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedTransition {
    pub transition: Bytes,
    pub inclusion_proof: TransitionInclusionProof,
}

/// A storage slot plus its state-tree sibling path against some root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedStorageSlot {
    pub storage_slot: StorageSlot,
    pub siblings: Vec<B256>,
}
