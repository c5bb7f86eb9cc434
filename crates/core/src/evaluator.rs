//! Deterministic transition evaluation.
//!
//! The evaluator is the pure half of the fraud-proof adjudicator: given a
//! committed transition and the current values of the slots it touches, it
//! either produces the post-transition leaf hashes or reports exactly why
//! the transition cannot apply. It holds no chain state; the signature
//! domain address and the token-index bound are fixed at construction.

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

use crate::signature::recover_signer;
use crate::transition::{transfer_message, withdraw_message, Transition};
use crate::types::{AccountInfo, CodecError, StorageSlot};

/// Why a transition fails to apply. From the adjudicator's point of view
/// every variant is equally damning; the detail exists for operators
/// debugging their pipelines.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error("transition touches {expected} slots, {got} supplied")]
    SlotCountMismatch { expected: usize, got: usize },
    #[error("slot {0} is already inhabited")]
    SlotOccupied(u32),
    #[error("slot {0} is uninhabited")]
    SlotEmpty(u32),
    #[error("token index {0} is out of range")]
    UnknownToken(u32),
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: U256, available: U256 },
    #[error("nonce mismatch: expected {expected}, transition carries {got}")]
    NonceMismatch { expected: U256, got: U256 },
    #[error("signature does not recover to the authorizing account")]
    InvalidSignature,
}

/// The abstract evaluation capability the rollup chain consumes. Callers
/// must treat every `Err` as a recoverable signal (it proves fraud when the
/// input was committed by an operator), never as an abort.
pub trait TransitionEvaluator {
    /// Decode a transition: its asserted post-state root and the ordered
    /// slot indices it touches.
    fn state_root_and_access_list(
        &self,
        transition: &[u8],
    ) -> Result<(B256, Vec<u32>), EvaluatorError>;

    /// Apply a transition to its access-list slots (same order), returning
    /// the post-transition leaf hashes to install.
    fn evaluate(
        &self,
        transition: &[u8],
        slots: &[StorageSlot],
    ) -> Result<Vec<B256>, EvaluatorError>;

    /// Whether `transition` is a withdraw correctly signed by `account`.
    fn verify_withdraw(&self, account: Address, transition: &[u8]) -> bool;
}

/// The production evaluator.
#[derive(Clone, Debug)]
pub struct PureEvaluator {
    chain_address: Address,
    num_tokens: u32,
}

impl PureEvaluator {
    /// `chain_address` anchors the signed-message domain; `num_tokens` is
    /// the registry's token count, fixing the legal token-index range.
    pub fn new(chain_address: Address, num_tokens: u32) -> Self {
        Self {
            chain_address,
            num_tokens,
        }
    }

    fn check_token(&self, token_index: u32) -> Result<(), EvaluatorError> {
        if token_index >= self.num_tokens {
            return Err(EvaluatorError::UnknownToken(token_index));
        }
        Ok(())
    }

    fn check_inhabited(slot: &StorageSlot) -> Result<(), EvaluatorError> {
        if slot.value.is_empty() {
            return Err(EvaluatorError::SlotEmpty(slot.slot_index));
        }
        Ok(())
    }

    fn check_uninhabited(slot: &StorageSlot) -> Result<(), EvaluatorError> {
        if !slot.value.is_empty() {
            return Err(EvaluatorError::SlotOccupied(slot.slot_index));
        }
        Ok(())
    }

    fn expect_slots<'a, const N: usize>(
        slots: &'a [StorageSlot],
    ) -> Result<&'a [StorageSlot; N], EvaluatorError> {
        slots
            .try_into()
            .map_err(|_| EvaluatorError::SlotCountMismatch {
                expected: N,
                got: slots.len(),
            })
    }

    fn debit(info: &mut AccountInfo, token_index: u32, amount: U256) -> Result<(), EvaluatorError> {
        let available = info.balance(token_index);
        if !info.debit(token_index, amount) {
            return Err(EvaluatorError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn check_nonce(expected: U256, got: U256) -> Result<(), EvaluatorError> {
        if expected != got {
            return Err(EvaluatorError::NonceMismatch { expected, got });
        }
        Ok(())
    }

    /// Shared tail of the two transfer variants. `sender` and `recipient`
    /// are the slot values with any creation already applied;
    /// `recipient_account` is the address named in the signed message.
    #[allow(clippy::too_many_arguments)]
    fn apply_transfer(
        &self,
        mut sender: AccountInfo,
        mut recipient: AccountInfo,
        recipient_account: Address,
        token_index: u32,
        amount: U256,
        nonce: U256,
        signature: &[u8],
    ) -> Result<Vec<B256>, EvaluatorError> {
        self.check_token(token_index)?;
        Self::check_nonce(sender.transfer_nonce(token_index), nonce)?;

        let message =
            transfer_message(self.chain_address, recipient_account, token_index, amount, nonce);
        if recover_signer(&message, signature) != Ok(sender.account) {
            return Err(EvaluatorError::InvalidSignature);
        }

        Self::debit(&mut sender, token_index, amount)?;
        sender.bump_transfer_nonce(token_index);
        recipient.credit(token_index, amount);

        Ok(vec![sender.leaf_hash(), recipient.leaf_hash()])
    }
}

impl TransitionEvaluator for PureEvaluator {
    fn state_root_and_access_list(
        &self,
        transition: &[u8],
    ) -> Result<(B256, Vec<u32>), EvaluatorError> {
        let decoded = Transition::decode(transition)?;
        Ok((decoded.state_root(), decoded.access_list()))
    }

    fn evaluate(
        &self,
        transition: &[u8],
        slots: &[StorageSlot],
    ) -> Result<Vec<B256>, EvaluatorError> {
        match Transition::decode(transition)? {
            Transition::CreateAndDeposit {
                account,
                token_index,
                amount,
                ..
            } => {
                let [slot] = Self::expect_slots::<1>(slots)?;
                self.check_token(token_index)?;
                Self::check_uninhabited(slot)?;
                let mut created = AccountInfo::with_account(account);
                created.credit(token_index, amount);
                Ok(vec![created.leaf_hash()])
            }
            Transition::Deposit {
                token_index,
                amount,
                ..
            } => {
                let [slot] = Self::expect_slots::<1>(slots)?;
                self.check_token(token_index)?;
                Self::check_inhabited(slot)?;
                let mut value = slot.value.clone();
                value.credit(token_index, amount);
                Ok(vec![value.leaf_hash()])
            }
            Transition::Withdraw {
                token_index,
                amount,
                nonce,
                ref signature,
                ..
            } => {
                let [slot] = Self::expect_slots::<1>(slots)?;
                self.check_token(token_index)?;
                Self::check_inhabited(slot)?;
                let mut value = slot.value.clone();
                Self::check_nonce(value.withdraw_nonce(token_index), nonce)?;

                let message = withdraw_message(self.chain_address, token_index, amount, nonce);
                if recover_signer(&message, signature) != Ok(value.account) {
                    return Err(EvaluatorError::InvalidSignature);
                }

                Self::debit(&mut value, token_index, amount)?;
                value.bump_withdraw_nonce(token_index);
                Ok(vec![value.leaf_hash()])
            }
            Transition::CreateAndTransfer {
                recipient_account,
                token_index,
                amount,
                nonce,
                ref signature,
                ..
            } => {
                let [sender, recipient] = Self::expect_slots::<2>(slots)?;
                Self::check_inhabited(sender)?;
                Self::check_uninhabited(recipient)?;
                self.apply_transfer(
                    sender.value.clone(),
                    AccountInfo::with_account(recipient_account),
                    recipient_account,
                    token_index,
                    amount,
                    nonce,
                    signature,
                )
            }
            Transition::Transfer {
                token_index,
                amount,
                nonce,
                ref signature,
                ..
            } => {
                let [sender, recipient] = Self::expect_slots::<2>(slots)?;
                Self::check_inhabited(sender)?;
                Self::check_inhabited(recipient)?;
                self.apply_transfer(
                    sender.value.clone(),
                    recipient.value.clone(),
                    recipient.value.account,
                    token_index,
                    amount,
                    nonce,
                    signature,
                )
            }
        }
    }

    fn verify_withdraw(&self, account: Address, transition: &[u8]) -> bool {
        let Ok(Transition::Withdraw {
            token_index,
            amount,
            nonce,
            ref signature,
            ..
        }) = Transition::decode(transition)
        else {
            return false;
        };
        let message = withdraw_message(self.chain_address, token_index, amount, nonce);
        recover_signer(&message, signature) == Ok(account)
    }
}
