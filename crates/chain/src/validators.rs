//! Validator set, committer rotation, and threshold signature checking.
//!
//! The registry and the rollup chain reference each other: the chain asks
//! the registry to check signatures and rotate, the registry pushes each
//! newly elected committer back into the chain. The cycle is broken with
//! the [`CommitterSink`] trait plus a one-shot address binding; every
//! cross-call is rejected until the chain address is bound.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use rollup_core::signature::recover_signer;
use tracing::{debug, info};

use crate::error::ChainError;
use crate::events::{ChainEvent, EventLog};

/// Receiver of committer rotation updates. Implemented by the rollup
/// chain; the registry never holds a direct reference to it.
pub trait CommitterSink {
    fn set_committer(&mut self, committer: Address);
}

/// How validator signatures are counted against the threshold.
///
/// There is deliberately no `Default`: the two modes disagree on accepting
/// sparse signature sets and a deployment must pick one explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdMode {
    /// What deployed verifiers enforce today: every validator index must
    /// carry a valid signature, which makes the subsequent `n < 4` /
    /// two-thirds count vacuous. The count still runs.
    Compat,
    /// Sparse signature sets: an empty entry abstains, a non-empty entry
    /// must be valid, and the count of valid entries must be `n` when
    /// `n < 4` or strictly more than `2n/3` otherwise.
    Fixed,
}

/// The message validators sign to endorse a block: the block number and
/// the encoded transitions, ABI-encoded as `(uint256, bytes[])`.
/// Signatures apply the signed-message prefix to its keccak digest.
pub fn block_message(block_number: u64, transitions: &[Bytes]) -> Vec<u8> {
    (U256::from(block_number), transitions.to_vec()).abi_encode()
}

/// Ordered validator set with a round-robin committer cursor.
#[derive(Debug)]
pub struct ValidatorRegistry {
    owner: Address,
    mode: ThresholdMode,
    validators: Vec<Address>,
    current_committer_index: usize,
    rollup_chain: Option<Address>,
    events: EventLog,
}

impl ValidatorRegistry {
    pub fn new(owner: Address, mode: ThresholdMode) -> Self {
        Self {
            owner,
            mode,
            validators: Vec::new(),
            current_committer_index: 0,
            rollup_chain: None,
            events: EventLog::default(),
        }
    }

    /// Bind the rollup chain address, then push the current committer into
    /// it so the chain immediately learns who may commit.
    pub fn set_rollup_chain_address(
        &mut self,
        caller: Address,
        chain: Address,
        sink: &mut dyn CommitterSink,
    ) -> Result<(), ChainError> {
        self.require_owner(caller)?;
        self.rollup_chain = Some(chain);
        info!(chain = %chain, "rollup chain bound");
        if !self.validators.is_empty() {
            self.current_committer_index = 0;
            self.push_committer(sink);
        }
        Ok(())
    }

    /// Replace the validator set and reset the committer cursor.
    pub fn set_validators(
        &mut self,
        caller: Address,
        validators: Vec<Address>,
        sink: &mut dyn CommitterSink,
    ) -> Result<(), ChainError> {
        self.require_owner(caller)?;
        if self.rollup_chain.is_none() {
            return Err(ChainError::ChainNotBound);
        }
        if validators.is_empty() {
            return Err(ChainError::EmptyValidatorSet);
        }
        info!(count = validators.len(), "validator set replaced");
        self.validators = validators;
        self.current_committer_index = 0;
        self.push_committer(sink);
        Ok(())
    }

    /// Check the co-validator signatures over a block about to be
    /// committed. Callable only by the bound rollup chain.
    pub fn check_signatures(
        &self,
        caller: Address,
        block_number: u64,
        transitions: &[Bytes],
        signatures: &[Bytes],
    ) -> Result<(), ChainError> {
        self.require_chain(caller)?;
        let total = self.validators.len();
        if signatures.len() != total {
            return Err(ChainError::SignatureCountMismatch {
                expected: total,
                got: signatures.len(),
            });
        }

        let message = block_message(block_number, transitions);
        let mut valid = 0usize;
        for (index, signature) in signatures.iter().enumerate() {
            if signature.is_empty() {
                match self.mode {
                    ThresholdMode::Compat => {
                        return Err(ChainError::InvalidValidatorSignature(index))
                    }
                    ThresholdMode::Fixed => continue,
                }
            }
            if recover_signer(&message, signature) != Ok(self.validators[index]) {
                return Err(ChainError::InvalidValidatorSignature(index));
            }
            valid += 1;
        }

        let met = if total < 4 {
            valid == total
        } else {
            valid * 3 > total * 2
        };
        if !met {
            return Err(ChainError::ThresholdNotMet { valid, total });
        }
        debug!(block_number, valid, total, "block signatures verified");
        Ok(())
    }

    /// Advance the committer cursor after a successful commit. Callable
    /// only by the bound rollup chain.
    pub fn pick_next_committer(
        &mut self,
        caller: Address,
        sink: &mut dyn CommitterSink,
    ) -> Result<(), ChainError> {
        self.require_chain(caller)?;
        if self.validators.is_empty() {
            return Err(ChainError::EmptyValidatorSet);
        }
        self.current_committer_index =
            (self.current_committer_index + 1) % self.validators.len();
        self.push_committer(sink);
        Ok(())
    }

    pub fn current_committer(&self) -> Option<Address> {
        self.validators.get(self.current_committer_index).copied()
    }

    pub fn validators(&self) -> &[Address] {
        &self.validators
    }

    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        self.events.drain()
    }

    fn push_committer(&mut self, sink: &mut dyn CommitterSink) {
        let committer = self.validators[self.current_committer_index];
        info!(committer = %committer, index = self.current_committer_index, "committer changed");
        self.events.emit(ChainEvent::CommitterChanged {
            new_committer: committer,
        });
        sink.set_committer(committer);
    }

    fn require_owner(&self, caller: Address) -> Result<(), ChainError> {
        if caller != self.owner {
            return Err(ChainError::NotOwner);
        }
        Ok(())
    }

    fn require_chain(&self, caller: Address) -> Result<(), ChainError> {
        match self.rollup_chain {
            None => Err(ChainError::ChainNotBound),
            Some(chain) if caller != chain => Err(ChainError::NotRollupChain),
            Some(_) => Ok(()),
        }
    }
}
