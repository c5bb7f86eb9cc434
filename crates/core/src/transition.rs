//! Tagged transition records and their ABI codec.
//!
//! A transition is the on-chain footprint of one sidechain transaction.
//! On the wire it is the ABI encoding of a per-variant record whose first
//! word is the `transitionType` discriminator, so a decoder can dispatch
//! on word zero before committing to a layout. Every record carries the
//! operator-asserted state root *after* the transition applies.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};
use serde::{Deserialize, Serialize};

use crate::types::CodecError;

pub const TRANSITION_TYPE_CREATE_AND_DEPOSIT: u8 = 0;
pub const TRANSITION_TYPE_DEPOSIT: u8 = 1;
pub const TRANSITION_TYPE_WITHDRAW: u8 = 2;
pub const TRANSITION_TYPE_CREATE_AND_TRANSFER: u8 = 3;
pub const TRANSITION_TYPE_TRANSFER: u8 = 4;

sol! {
    struct CreateAndDepositRecord {
        uint256 transitionType;
        bytes32 stateRoot;
        uint256 accountSlotIndex;
        address account;
        uint256 tokenIndex;
        uint256 amount;
    }

    struct DepositRecord {
        uint256 transitionType;
        bytes32 stateRoot;
        uint256 accountSlotIndex;
        uint256 tokenIndex;
        uint256 amount;
    }

    struct WithdrawRecord {
        uint256 transitionType;
        bytes32 stateRoot;
        uint256 accountSlotIndex;
        uint256 tokenIndex;
        uint256 amount;
        uint256 nonce;
        bytes signature;
    }

    struct CreateAndTransferRecord {
        uint256 transitionType;
        bytes32 stateRoot;
        uint256 senderSlotIndex;
        uint256 recipientSlotIndex;
        address recipientAccount;
        uint256 tokenIndex;
        uint256 amount;
        uint256 nonce;
        bytes signature;
    }

    struct TransferRecord {
        uint256 transitionType;
        bytes32 stateRoot;
        uint256 senderSlotIndex;
        uint256 recipientSlotIndex;
        uint256 tokenIndex;
        uint256 amount;
        uint256 nonce;
        bytes signature;
    }
}

/// Decoded transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Create the slot at `account_slot_index` (must be uninhabited), bind
    /// it to `account`, and credit the deposited amount.
    CreateAndDeposit {
        state_root: B256,
        account_slot_index: u32,
        account: Address,
        token_index: u32,
        amount: U256,
    },
    /// Credit an existing slot.
    Deposit {
        state_root: B256,
        account_slot_index: u32,
        token_index: u32,
        amount: U256,
    },
    /// Debit the slot and bump its withdraw nonce; authorized by the slot
    /// account's signature.
    Withdraw {
        state_root: B256,
        account_slot_index: u32,
        token_index: u32,
        amount: U256,
        nonce: U256,
        signature: Bytes,
    },
    /// Create the recipient slot, then transfer into it.
    CreateAndTransfer {
        state_root: B256,
        sender_slot_index: u32,
        recipient_slot_index: u32,
        recipient_account: Address,
        token_index: u32,
        amount: U256,
        nonce: U256,
        signature: Bytes,
    },
    /// Move balance between two existing slots; authorized by the sender.
    Transfer {
        state_root: B256,
        sender_slot_index: u32,
        recipient_slot_index: u32,
        token_index: u32,
        amount: U256,
        nonce: U256,
        signature: Bytes,
    },
}

impl Transition {
    pub fn transition_type(&self) -> u8 {
        match self {
            Self::CreateAndDeposit { .. } => TRANSITION_TYPE_CREATE_AND_DEPOSIT,
            Self::Deposit { .. } => TRANSITION_TYPE_DEPOSIT,
            Self::Withdraw { .. } => TRANSITION_TYPE_WITHDRAW,
            Self::CreateAndTransfer { .. } => TRANSITION_TYPE_CREATE_AND_TRANSFER,
            Self::Transfer { .. } => TRANSITION_TYPE_TRANSFER,
        }
    }

    /// The operator-asserted post-state root.
    pub fn state_root(&self) -> B256 {
        match self {
            Self::CreateAndDeposit { state_root, .. }
            | Self::Deposit { state_root, .. }
            | Self::Withdraw { state_root, .. }
            | Self::CreateAndTransfer { state_root, .. }
            | Self::Transfer { state_root, .. } => *state_root,
        }
    }

    /// Ordered storage-slot indices this transition reads and writes.
    /// Transfers touch sender first, recipient second.
    pub fn access_list(&self) -> Vec<u32> {
        match self {
            Self::CreateAndDeposit {
                account_slot_index, ..
            }
            | Self::Deposit {
                account_slot_index, ..
            }
            | Self::Withdraw {
                account_slot_index, ..
            } => vec![*account_slot_index],
            Self::CreateAndTransfer {
                sender_slot_index,
                recipient_slot_index,
                ..
            }
            | Self::Transfer {
                sender_slot_index,
                recipient_slot_index,
                ..
            } => vec![*sender_slot_index, *recipient_slot_index],
        }
    }

    /// Canonical wire encoding.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::CreateAndDeposit {
                state_root,
                account_slot_index,
                account,
                token_index,
                amount,
            } => CreateAndDepositRecord {
                transitionType: U256::from(TRANSITION_TYPE_CREATE_AND_DEPOSIT),
                stateRoot: *state_root,
                accountSlotIndex: U256::from(*account_slot_index),
                account: *account,
                tokenIndex: U256::from(*token_index),
                amount: *amount,
            }
            .abi_encode()
            .into(),
            Self::Deposit {
                state_root,
                account_slot_index,
                token_index,
                amount,
            } => DepositRecord {
                transitionType: U256::from(TRANSITION_TYPE_DEPOSIT),
                stateRoot: *state_root,
                accountSlotIndex: U256::from(*account_slot_index),
                tokenIndex: U256::from(*token_index),
                amount: *amount,
            }
            .abi_encode()
            .into(),
            Self::Withdraw {
                state_root,
                account_slot_index,
                token_index,
                amount,
                nonce,
                signature,
            } => WithdrawRecord {
                transitionType: U256::from(TRANSITION_TYPE_WITHDRAW),
                stateRoot: *state_root,
                accountSlotIndex: U256::from(*account_slot_index),
                tokenIndex: U256::from(*token_index),
                amount: *amount,
                nonce: *nonce,
                signature: signature.clone(),
            }
            .abi_encode()
            .into(),
            Self::CreateAndTransfer {
                state_root,
                sender_slot_index,
                recipient_slot_index,
                recipient_account,
                token_index,
                amount,
                nonce,
                signature,
            } => CreateAndTransferRecord {
                transitionType: U256::from(TRANSITION_TYPE_CREATE_AND_TRANSFER),
                stateRoot: *state_root,
                senderSlotIndex: U256::from(*sender_slot_index),
                recipientSlotIndex: U256::from(*recipient_slot_index),
                recipientAccount: *recipient_account,
                tokenIndex: U256::from(*token_index),
                amount: *amount,
                nonce: *nonce,
                signature: signature.clone(),
            }
            .abi_encode()
            .into(),
            Self::Transfer {
                state_root,
                sender_slot_index,
                recipient_slot_index,
                token_index,
                amount,
                nonce,
                signature,
            } => TransferRecord {
                transitionType: U256::from(TRANSITION_TYPE_TRANSFER),
                stateRoot: *state_root,
                senderSlotIndex: U256::from(*sender_slot_index),
                recipientSlotIndex: U256::from(*recipient_slot_index),
                tokenIndex: U256::from(*token_index),
                amount: *amount,
                nonce: *nonce,
                signature: signature.clone(),
            }
            .abi_encode()
            .into(),
        }
    }

    /// Decode a wire transition. Fails cleanly on truncated input, an
    /// unknown discriminator, malformed ABI, or an oversized slot index.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < 32 {
            return Err(CodecError::MalformedTransition);
        }
        let tag = U256::from_be_slice(&bytes[..32]);
        let tag_byte = u8::try_from(tag).map_err(|_| CodecError::UnknownTransitionType(tag))?;

        match tag_byte {
            TRANSITION_TYPE_CREATE_AND_DEPOSIT => {
                let r = CreateAndDepositRecord::abi_decode(bytes, true)
                    .map_err(|_| CodecError::MalformedTransition)?;
                Ok(Self::CreateAndDeposit {
                    state_root: r.stateRoot,
                    account_slot_index: slot_index(r.accountSlotIndex)?,
                    account: r.account,
                    token_index: token_index(r.tokenIndex)?,
                    amount: r.amount,
                })
            }
            TRANSITION_TYPE_DEPOSIT => {
                let r = DepositRecord::abi_decode(bytes, true)
                    .map_err(|_| CodecError::MalformedTransition)?;
                Ok(Self::Deposit {
                    state_root: r.stateRoot,
                    account_slot_index: slot_index(r.accountSlotIndex)?,
                    token_index: token_index(r.tokenIndex)?,
                    amount: r.amount,
                })
            }
            TRANSITION_TYPE_WITHDRAW => {
                let r = WithdrawRecord::abi_decode(bytes, true)
                    .map_err(|_| CodecError::MalformedTransition)?;
                Ok(Self::Withdraw {
                    state_root: r.stateRoot,
                    account_slot_index: slot_index(r.accountSlotIndex)?,
                    token_index: token_index(r.tokenIndex)?,
                    amount: r.amount,
                    nonce: r.nonce,
                    signature: r.signature,
                })
            }
            TRANSITION_TYPE_CREATE_AND_TRANSFER => {
                let r = CreateAndTransferRecord::abi_decode(bytes, true)
                    .map_err(|_| CodecError::MalformedTransition)?;
                Ok(Self::CreateAndTransfer {
                    state_root: r.stateRoot,
                    sender_slot_index: slot_index(r.senderSlotIndex)?,
                    recipient_slot_index: slot_index(r.recipientSlotIndex)?,
                    recipient_account: r.recipientAccount,
                    token_index: token_index(r.tokenIndex)?,
                    amount: r.amount,
                    nonce: r.nonce,
                    signature: r.signature,
                })
            }
            TRANSITION_TYPE_TRANSFER => {
                let r = TransferRecord::abi_decode(bytes, true)
                    .map_err(|_| CodecError::MalformedTransition)?;
                Ok(Self::Transfer {
                    state_root: r.stateRoot,
                    sender_slot_index: slot_index(r.senderSlotIndex)?,
                    recipient_slot_index: slot_index(r.recipientSlotIndex)?,
                    token_index: token_index(r.tokenIndex)?,
                    amount: r.amount,
                    nonce: r.nonce,
                    signature: r.signature,
                })
            }
            _ => Err(CodecError::UnknownTransitionType(tag)),
        }
    }
}

/// Message a user signs to authorize a withdraw.
pub fn withdraw_message(chain: Address, token_index: u32, amount: U256, nonce: U256) -> Vec<u8> {
    (
        chain,
        "withdraw".to_string(),
        U256::from(token_index),
        amount,
        nonce,
    )
        .abi_encode()
}

/// Message a sender signs to authorize a transfer. `recipient` is the
/// stored account of the recipient slot, or the account being created for
/// a create-and-transfer.
pub fn transfer_message(
    chain: Address,
    recipient: Address,
    token_index: u32,
    amount: U256,
    nonce: U256,
) -> Vec<u8> {
    (chain, recipient, U256::from(token_index), amount, nonce).abi_encode()
}

fn slot_index(value: U256) -> Result<u32, CodecError> {
    u32::try_from(value).map_err(|_| CodecError::SlotIndexOverflow)
}

fn token_index(value: U256) -> Result<u32, CodecError> {
    u32::try_from(value).map_err(|_| CodecError::MalformedTransition)
}
