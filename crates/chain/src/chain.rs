//! Rollup block ledger, commit pipeline, and fraud-proof adjudication.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use tracing::{debug, info, warn};

use rollup_core::evaluator::TransitionEvaluator;
use rollup_core::types::{IncludedStorageSlot, IncludedTransition, StorageSlot};
use rollup_smt::{transitions_root, verify, ProofEngine, STATE_TREE_HEIGHT};

use crate::block::BlockEntry;
use crate::error::ChainError;
use crate::events::{ChainEvent, EventLog};
use crate::validators::{CommitterSink, ValidatorRegistry};

/// The settlement contract: an append-only ledger of block commitments and
/// the adjudicator that can take them back down.
///
/// Commitment is optimistic: [`RollupChain::commit_block`] checks only the
/// committer's identity, the block number, and the co-validator signature
/// threshold. [`RollupChain::prove_transition_invalid`] is where a block's
/// content is ever examined, one transition at a time, and only on demand.
pub struct RollupChain<E> {
    address: Address,
    committer: Option<Address>,
    blocks: Vec<BlockEntry>,
    engine: ProofEngine,
    evaluator: E,
    events: EventLog,
}

impl<E> CommitterSink for RollupChain<E> {
    fn set_committer(&mut self, committer: Address) {
        self.committer = Some(committer);
    }
}

impl<E: TransitionEvaluator> RollupChain<E> {
    /// `address` is the chain's own address: the signed-message domain its
    /// users' transition signatures are anchored to, and the identity it
    /// presents to the validator registry.
    pub fn new(address: Address, evaluator: E) -> Self {
        Self {
            address,
            committer: None,
            blocks: Vec::new(),
            engine: ProofEngine::new(B256::ZERO, STATE_TREE_HEIGHT),
            evaluator,
            events: EventLog::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn committer(&self) -> Option<Address> {
        self.committer
    }

    /// Index of the most recently committed block, pruned or not.
    pub fn current_block_number(&self) -> Option<u64> {
        (self.blocks.len() as u64).checked_sub(1)
    }

    pub fn block(&self, block_number: u64) -> Option<&BlockEntry> {
        self.blocks.get(block_number as usize)
    }

    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        self.events.drain()
    }

    /// Commit a block of encoded transitions. The transitions' semantic
    /// content is deliberately not validated here.
    pub fn commit_block(
        &mut self,
        caller: Address,
        block_number: u64,
        transitions: Vec<Bytes>,
        signatures: Vec<Bytes>,
        validators: &mut ValidatorRegistry,
    ) -> Result<(), ChainError> {
        if Some(caller) != self.committer {
            return Err(ChainError::NotCommitter);
        }
        if block_number != self.blocks.len() as u64 {
            return Err(ChainError::WrongBlockNumber);
        }
        validators.check_signatures(self.address, block_number, &transitions, &signatures)?;

        for transition in &transitions {
            self.events.emit(ChainEvent::Transition {
                data: transition.clone(),
            });
        }

        let root = transitions_root(&transitions);
        self.blocks
            .push(BlockEntry::new(root, transitions.len() as u64));
        info!(block_number, size = transitions.len(), root = %root, "rollup block committed");
        self.events.emit(ChainEvent::RollupBlockCommitted {
            block_number,
            transitions,
        });

        let chain_address = self.address;
        validators.pick_next_committer(chain_address, self)
    }

    /// Challenge one committed transition.
    ///
    /// `pre` anchors the state root the disputed transition starts from;
    /// `invalid` is the transition under challenge; `slots` are the
    /// storage witnesses for its access list, proven against `pre`'s
    /// asserted post-state root.
    ///
    /// Detected fraud prunes the invalid block and everything after it and
    /// returns `Ok(())`. Every other outcome is an error, so an honest
    /// operator costs the challenger the call.
    pub fn prove_transition_invalid(
        &mut self,
        pre: &IncludedTransition,
        invalid: &IncludedTransition,
        slots: &[IncludedStorageSlot],
    ) -> Result<(), ChainError> {
        self.verify_sequential_transitions(pre, invalid)?;
        let invalid_block = invalid.inclusion_proof.block_number;

        let (pre_state_root, _) = self
            .decode_transition(&pre.transition)
            .map_err(|_| ChainError::InvalidPreTransition)?;
        let (invalid_state_root, access_list) = match self.decode_transition(&invalid.transition)
        {
            Ok(decoded) => decoded,
            Err(_) => {
                // An operator committed bytes the evaluator cannot even
                // decode. That alone is fraud.
                warn!(block = invalid_block, "committed transition does not decode");
                self.prune_blocks_after(invalid_block);
                return Ok(());
            }
        };

        if slots.len() != access_list.len() {
            return Err(ChainError::AccessListMismatch);
        }
        for (slot, &expected) in slots.iter().zip(&access_list) {
            if slot.storage_slot.slot_index != expected {
                return Err(ChainError::AccessListMismatch);
            }
        }

        self.engine.reset(pre_state_root, STATE_TREE_HEIGHT);
        for slot in slots {
            self.engine.verify_and_store(
                &slot.storage_slot.value.encode(),
                slot.storage_slot.slot_index,
                &slot.siblings,
            )?;
        }

        let plain: Vec<StorageSlot> = slots.iter().map(|s| s.storage_slot.clone()).collect();
        let outputs = match self.evaluate_transition(&invalid.transition, &plain) {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!(block = invalid_block, %err, "transition fails evaluation");
                self.prune_blocks_after(invalid_block);
                return Ok(());
            }
        };

        for (slot, output) in slots.iter().zip(outputs) {
            self.engine
                .update_leaf(output, slot.storage_slot.slot_index)?;
        }

        if self.engine.root() != invalid_state_root {
            warn!(
                block = invalid_block,
                computed = %self.engine.root(),
                asserted = %invalid_state_root,
                "post-state root mismatch"
            );
            self.prune_blocks_after(invalid_block);
            return Ok(());
        }
        Err(ChainError::NoFraudDetected)
    }

    /// Zero every block from `block_number` upward. The ledger keeps its
    /// length; pruned indices become tombstones and are never reassigned.
    pub fn prune_blocks_after(&mut self, block_number: u64) {
        let mut pruned = 0usize;
        for entry in self.blocks.iter_mut().skip(block_number as usize) {
            if !entry.is_tombstone() {
                entry.clear();
                pruned += 1;
            }
        }
        if pruned > 0 {
            warn!(from = block_number, pruned, "pruned rollup blocks");
        }
    }

    /// Both transitions must be included in live blocks and sit in
    /// consecutive positions: same block at adjacent indices, or the last
    /// transition of one block followed by the first of the next.
    fn verify_sequential_transitions(
        &self,
        pre: &IncludedTransition,
        invalid: &IncludedTransition,
    ) -> Result<(), ChainError> {
        let pre_size = self.verify_inclusion(pre)?;
        self.verify_inclusion(invalid)?;

        let pre_proof = &pre.inclusion_proof;
        let invalid_proof = &invalid.inclusion_proof;
        let same_block = invalid_proof.block_number == pre_proof.block_number
            && u64::from(invalid_proof.transition_index)
                == u64::from(pre_proof.transition_index) + 1;
        let block_boundary = invalid_proof.block_number == pre_proof.block_number + 1
            && invalid_proof.transition_index == 0
            && u64::from(pre_proof.transition_index) == pre_size - 1;
        if !(same_block || block_boundary) {
            return Err(ChainError::NotSequential);
        }
        Ok(())
    }

    /// Check a transition's inclusion proof against its claimed block.
    /// Returns the block size for the adjacency check.
    fn verify_inclusion(&self, included: &IncludedTransition) -> Result<u64, ChainError> {
        let proof = &included.inclusion_proof;
        let entry = self
            .blocks
            .get(proof.block_number as usize)
            .ok_or(ChainError::UnknownBlock(proof.block_number))?;
        if entry.is_tombstone() {
            return Err(ChainError::UnknownBlock(proof.block_number));
        }
        if u64::from(proof.transition_index) >= entry.block_size {
            return Err(ChainError::MissingInclusion);
        }
        if proof.siblings.len() != transitions_tree_height(entry.block_size) {
            return Err(ChainError::MissingInclusion);
        }
        if !verify(
            entry.root_hash,
            &included.transition,
            proof.transition_index,
            &proof.siblings,
        ) {
            return Err(ChainError::MissingInclusion);
        }
        Ok(entry.block_size)
    }

    /// Evaluator decode call, mirrored to the event stream.
    fn decode_transition(
        &mut self,
        transition: &[u8],
    ) -> Result<(B256, Vec<u32>), rollup_core::EvaluatorError> {
        let result = self.evaluator.state_root_and_access_list(transition);
        match &result {
            Ok((root, access_list)) => {
                let indices: Vec<U256> = access_list.iter().map(|&i| U256::from(i)).collect();
                self.events.emit(ChainEvent::DecodedTransition {
                    success: true,
                    return_data: (*root, indices).abi_encode().into(),
                });
            }
            Err(err) => {
                debug!(%err, "transition decode failed");
                self.events.emit(ChainEvent::DecodedTransition {
                    success: false,
                    return_data: Bytes::new(),
                });
            }
        }
        result
    }

    /// Evaluator evaluate call, mirrored to the event stream.
    fn evaluate_transition(
        &mut self,
        transition: &[u8],
        slots: &[StorageSlot],
    ) -> Result<Vec<B256>, rollup_core::EvaluatorError> {
        let result = self.evaluator.evaluate(transition, slots);
        match &result {
            Ok(outputs) => {
                self.events.emit(ChainEvent::DecodedTransition {
                    success: true,
                    return_data: outputs.abi_encode().into(),
                });
            }
            Err(err) => {
                debug!(%err, "transition evaluation failed");
                self.events.emit(ChainEvent::DecodedTransition {
                    success: false,
                    return_data: Bytes::new(),
                });
            }
        }
        result
    }
}

/// Height of the transitions tree for a block of `block_size` leaves:
/// the hashed-leaf list is padded to a power of two.
fn transitions_tree_height(block_size: u64) -> usize {
    block_size.next_power_of_two().trailing_zeros() as usize
}
