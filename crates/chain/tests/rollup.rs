//! End-to-end commit and fraud-proof flows.
//!
//! The `Operator` harness below plays the off-chain side: it keeps the
//! real account state in a sparse Merkle tree, produces honestly (or
//! dishonestly) rooted transitions, and hands challengers the storage
//! witnesses the adjudicator wants to see.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use k256::ecdsa::SigningKey;

use rollup_chain::{
    block_message, ChainError, ChainEvent, RollupChain, ThresholdMode, ValidatorRegistry,
};
use rollup_core::signature::{address_of, sign_message};
use rollup_core::transition::transfer_message;
use rollup_core::{
    AccountInfo, IncludedStorageSlot, IncludedTransition, PureEvaluator, StorageSlot, Transition,
    TransitionInclusionProof,
};
use rollup_smt::{transitions_proof, transitions_root, SparseMerkleTree, STATE_TREE_HEIGHT};

const OWNER: Address = Address::repeat_byte(0x01);
const CHAIN: Address = Address::repeat_byte(0x02);

const TOKEN: u32 = 0;
const ALICE_SLOT: u32 = 0;
const BOB_SLOT: u32 = 1;

/// Off-chain operator state: the full account tree plus every batch it has
/// committed, kept around for inclusion proofs.
struct Operator {
    tree: SparseMerkleTree,
    slots: HashMap<u32, AccountInfo>,
    batches: Vec<Vec<Bytes>>,
}

impl Operator {
    fn new() -> Self {
        Self {
            tree: SparseMerkleTree::new(STATE_TREE_HEIGHT, AccountInfo::default().leaf_hash()),
            slots: HashMap::new(),
            batches: Vec::new(),
        }
    }

    fn seed(&mut self, slot_index: u32, value: AccountInfo) {
        self.tree.insert(slot_index, value.leaf_hash());
        self.slots.insert(slot_index, value);
    }

    fn state_root(&self) -> B256 {
        self.tree.root()
    }

    fn slot(&self, slot_index: u32) -> AccountInfo {
        self.slots.get(&slot_index).cloned().unwrap_or_default()
    }

    /// Storage witnesses for an access list, against the current root.
    /// Must be taken before the disputed transition is applied.
    fn witnesses(&self, access_list: &[u32]) -> Vec<IncludedStorageSlot> {
        access_list
            .iter()
            .map(|&slot_index| IncludedStorageSlot {
                storage_slot: StorageSlot {
                    slot_index,
                    value: self.slot(slot_index),
                },
                siblings: self.tree.proof(slot_index),
            })
            .collect()
    }

    /// Build, sign, and apply a transfer. `asserted_root` overrides the
    /// honest post-state root when the operator is lying.
    fn transfer(
        &mut self,
        sender_key: &SigningKey,
        sender_slot: u32,
        recipient_slot: u32,
        amount: u64,
        asserted_root: Option<B256>,
    ) -> Bytes {
        let amount = U256::from(amount);
        let mut sender = self.slot(sender_slot);
        let mut recipient = self.slot(recipient_slot);
        let nonce = sender.transfer_nonce(TOKEN);

        let message = transfer_message(CHAIN, recipient.account, TOKEN, amount, nonce);
        let signature = sign_message(sender_key, &message).unwrap();

        assert!(sender.debit(TOKEN, amount));
        sender.bump_transfer_nonce(TOKEN);
        recipient.credit(TOKEN, amount);
        self.seed(sender_slot, sender);
        self.seed(recipient_slot, recipient);

        Transition::Transfer {
            state_root: asserted_root.unwrap_or_else(|| self.state_root()),
            sender_slot_index: sender_slot,
            recipient_slot_index: recipient_slot,
            token_index: TOKEN,
            amount,
            nonce,
            signature: signature.into(),
        }
        .encode()
    }

    fn record_batch(&mut self, transitions: Vec<Bytes>) {
        self.batches.push(transitions);
    }

    fn included(&self, block_number: u64, transition_index: u32) -> IncludedTransition {
        let batch = &self.batches[block_number as usize];
        IncludedTransition {
            transition: batch[transition_index as usize].clone(),
            inclusion_proof: TransitionInclusionProof {
                block_number,
                transition_index,
                siblings: transitions_proof(batch, transition_index).unwrap(),
            },
        }
    }
}

struct Fixture {
    chain: RollupChain<PureEvaluator>,
    registry: ValidatorRegistry,
    validator_keys: Vec<SigningKey>,
    validators: Vec<Address>,
    operator: Operator,
    alice: SigningKey,
    bob: SigningKey,
}

impl Fixture {
    fn new() -> Result<Self> {
        let validator_keys: Vec<SigningKey> = (1u8..=3)
            .map(|i| SigningKey::from_slice(&[i; 32]).unwrap())
            .collect();
        let validators: Vec<Address> = validator_keys
            .iter()
            .map(|k| address_of(k.verifying_key()))
            .collect();

        let mut chain = RollupChain::new(CHAIN, PureEvaluator::new(CHAIN, 1));
        let mut registry = ValidatorRegistry::new(OWNER, ThresholdMode::Compat);
        registry.set_rollup_chain_address(OWNER, CHAIN, &mut chain)?;
        registry.set_validators(OWNER, validators.clone(), &mut chain)?;

        let alice = SigningKey::from_slice(&[0xa1; 32]).unwrap();
        let bob = SigningKey::from_slice(&[0xb0; 32]).unwrap();
        let mut operator = Operator::new();
        let mut alice_account = AccountInfo::with_account(address_of(alice.verifying_key()));
        alice_account.credit(TOKEN, U256::from(1_000));
        operator.seed(ALICE_SLOT, alice_account);
        let mut bob_account = AccountInfo::with_account(address_of(bob.verifying_key()));
        bob_account.credit(TOKEN, U256::from(100));
        operator.seed(BOB_SLOT, bob_account);

        Ok(Self {
            chain,
            registry,
            validator_keys,
            validators,
            operator,
            alice,
            bob,
        })
    }

    fn sign_block(&self, block_number: u64, transitions: &[Bytes]) -> Vec<Bytes> {
        let message = block_message(block_number, transitions);
        self.validator_keys
            .iter()
            .map(|k| Bytes::from(sign_message(k, &message).unwrap()))
            .collect()
    }

    /// Commit a batch as the elected committer and record it operator-side.
    fn commit(&mut self, block_number: u64, transitions: Vec<Bytes>) -> Result<(), ChainError> {
        let committer = self.chain.committer().expect("committer bound");
        let signatures = self.sign_block(block_number, &transitions);
        self.chain.commit_block(
            committer,
            block_number,
            transitions.clone(),
            signatures,
            &mut self.registry,
        )?;
        self.operator.record_batch(transitions);
        Ok(())
    }

    fn is_pruned(&self, block_number: u64) -> bool {
        self.chain.block(block_number).map_or(true, |b| b.is_tombstone())
    }
}

#[test]
fn happy_commit_appends_a_block_and_rotates() -> Result<()> {
    let mut fx = Fixture::new()?;
    assert_eq!(fx.chain.committer(), Some(fx.validators[0]));

    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 100, None);
    let t1 = fx
        .operator
        .transfer(&fx.bob, BOB_SLOT, ALICE_SLOT, 30, None);
    let batch = vec![t0.clone(), t1.clone()];
    fx.commit(0, batch.clone())?;

    assert_eq!(fx.chain.current_block_number(), Some(0));
    let block = fx.chain.block(0).unwrap();
    assert_eq!(block.root_hash, transitions_root(&batch));
    assert_eq!(block.block_size, 2);
    assert_eq!(fx.chain.committer(), Some(fx.validators[1]));

    let events = fx.chain.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ChainEvent::Transition { .. }))
            .count(),
        2
    );
    assert!(events.contains(&ChainEvent::RollupBlockCommitted {
        block_number: 0,
        transitions: batch,
    }));
    Ok(())
}

#[test]
fn committer_rotation_is_round_robin_over_commits() -> Result<()> {
    let mut fx = Fixture::new()?;
    for k in 0..5u64 {
        let t = fx
            .operator
            .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 1, None);
        fx.commit(k, vec![t])?;
        assert_eq!(
            fx.chain.committer(),
            Some(fx.validators[(k as usize + 1) % 3])
        );
    }
    Ok(())
}

#[test]
fn committing_the_wrong_block_number_fails() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t.clone()])?;

    // Replay of an already-committed number.
    let committer = fx.chain.committer().unwrap();
    let signatures = fx.sign_block(0, std::slice::from_ref(&t));
    assert_eq!(
        fx.chain
            .commit_block(committer, 0, vec![t.clone()], signatures, &mut fx.registry),
        Err(ChainError::WrongBlockNumber)
    );

    // A gap is just as wrong.
    let signatures = fx.sign_block(2, std::slice::from_ref(&t));
    assert_eq!(
        fx.chain
            .commit_block(committer, 2, vec![t], signatures, &mut fx.registry),
        Err(ChainError::WrongBlockNumber)
    );
    Ok(())
}

#[test]
fn only_the_elected_committer_may_commit() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t.clone()])?;

    // After one commit the baton has passed beyond validator 0.
    let stale = fx.validators[0];
    let signatures = fx.sign_block(1, std::slice::from_ref(&t));
    assert_eq!(
        fx.chain
            .commit_block(stale, 1, vec![t], signatures, &mut fx.registry),
        Err(ChainError::NotCommitter)
    );
    Ok(())
}

#[test]
fn root_mismatch_fraud_prunes_the_block() -> Result<()> {
    let mut fx = Fixture::new()?;

    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 100, None);
    fx.commit(0, vec![t0])?;

    // The witnesses must show the state between t0 and t1.
    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let t1 = fx.operator.transfer(
        &fx.alice,
        ALICE_SLOT,
        BOB_SLOT,
        50,
        Some(B256::repeat_byte(0xde)),
    );
    fx.commit(1, vec![t1])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);
    fx.chain.drain_events();
    fx.chain
        .prove_transition_invalid(&pre, &invalid, &witnesses)?;

    assert!(fx.is_pruned(1));
    assert!(!fx.is_pruned(0));
    // Still three evaluator calls on the books: decode pre, decode
    // invalid, evaluate invalid.
    let decoded: Vec<_> = fx
        .chain
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, ChainEvent::DecodedTransition { .. }))
        .collect();
    assert_eq!(decoded.len(), 3);
    Ok(())
}

#[test]
fn honest_roots_defeat_the_challenge() -> Result<()> {
    let mut fx = Fixture::new()?;

    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 100, None);
    fx.commit(0, vec![t0])?;

    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let t1 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 50, None);
    fx.commit(1, vec![t1])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);
    assert_eq!(
        fx.chain
            .prove_transition_invalid(&pre, &invalid, &witnesses),
        Err(ChainError::NoFraudDetected)
    );
    assert!(!fx.is_pruned(0));
    assert!(!fx.is_pruned(1));
    Ok(())
}

#[test]
fn cross_block_sequentiality_prunes_only_the_tail() -> Result<()> {
    let mut fx = Fixture::new()?;

    for k in 0..4u64 {
        let t = fx
            .operator
            .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
        fx.commit(k, vec![t])?;
    }
    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let lying = fx.operator.transfer(
        &fx.alice,
        ALICE_SLOT,
        BOB_SLOT,
        10,
        Some(B256::repeat_byte(0x66)),
    );
    fx.commit(4, vec![lying])?;

    let pre = fx.operator.included(3, 0);
    let invalid = fx.operator.included(4, 0);
    fx.chain
        .prove_transition_invalid(&pre, &invalid, &witnesses)?;

    for k in 0..4u64 {
        assert!(!fx.is_pruned(k), "block {k} should survive");
    }
    assert!(fx.is_pruned(4));
    Ok(())
}

#[test]
fn non_adjacent_transitions_are_rejected() -> Result<()> {
    let mut fx = Fixture::new()?;
    for k in 0..3u64 {
        let t = fx
            .operator
            .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 5, None);
        fx.commit(k, vec![t])?;
    }
    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(2, 0);
    assert_eq!(
        fx.chain
            .prove_transition_invalid(&pre, &invalid, &witnesses),
        Err(ChainError::NotSequential)
    );
    Ok(())
}

#[test]
fn undecodable_committed_bytes_are_fraud() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t0])?;

    let garbage = Bytes::from(vec![0xfe; 100]);
    fx.commit(1, vec![garbage])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);
    fx.chain.prove_transition_invalid(&pre, &invalid, &[])?;
    assert!(fx.is_pruned(1));
    Ok(())
}

#[test]
fn semantic_fraud_is_caught_by_evaluation() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t0])?;

    // An overdraft the operator waves through: alice holds 890 here.
    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let sender = fx.operator.slot(ALICE_SLOT);
    let recipient = fx.operator.slot(BOB_SLOT);
    let amount = U256::from(5_000);
    let nonce = sender.transfer_nonce(TOKEN);
    let message = transfer_message(CHAIN, recipient.account, TOKEN, amount, nonce);
    let signature = sign_message(&fx.alice, &message).unwrap();
    let overdraft = Transition::Transfer {
        state_root: fx.operator.state_root(),
        sender_slot_index: ALICE_SLOT,
        recipient_slot_index: BOB_SLOT,
        token_index: TOKEN,
        amount,
        nonce,
        signature: signature.into(),
    }
    .encode();
    fx.commit(1, vec![overdraft])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);
    fx.chain
        .prove_transition_invalid(&pre, &invalid, &witnesses)?;
    assert!(fx.is_pruned(1));
    Ok(())
}

#[test]
fn wrong_witnesses_abort_the_proof() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t0])?;

    let good = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let t1 = fx.operator.transfer(
        &fx.alice,
        ALICE_SLOT,
        BOB_SLOT,
        50,
        Some(B256::repeat_byte(0xde)),
    );
    fx.commit(1, vec![t1])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);

    // Access list mismatch: wrong slot order.
    let swapped = vec![good[1].clone(), good[0].clone()];
    assert_eq!(
        fx.chain.prove_transition_invalid(&pre, &invalid, &swapped),
        Err(ChainError::AccessListMismatch)
    );

    // Tampered slot value: no longer proves against the pre-state root.
    let mut tampered = good.clone();
    tampered[0].storage_slot.value.credit(TOKEN, U256::from(1));
    assert!(matches!(
        fx.chain.prove_transition_invalid(&pre, &invalid, &tampered),
        Err(ChainError::Witness(_))
    ));

    // The failed attempts must not have pruned anything.
    assert!(!fx.is_pruned(1));
    Ok(())
}

#[test]
fn proofs_against_pruned_blocks_fail() -> Result<()> {
    let mut fx = Fixture::new()?;
    let t0 = fx
        .operator
        .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 10, None);
    fx.commit(0, vec![t0])?;
    let witnesses = fx.operator.witnesses(&[ALICE_SLOT, BOB_SLOT]);
    let t1 = fx.operator.transfer(
        &fx.alice,
        ALICE_SLOT,
        BOB_SLOT,
        50,
        Some(B256::repeat_byte(0xde)),
    );
    fx.commit(1, vec![t1])?;

    let pre = fx.operator.included(0, 0);
    let invalid = fx.operator.included(1, 0);
    fx.chain
        .prove_transition_invalid(&pre, &invalid, &witnesses)?;
    assert!(fx.is_pruned(1));

    // The same proof again now points into a tombstone.
    assert_eq!(
        fx.chain
            .prove_transition_invalid(&pre, &invalid, &witnesses),
        Err(ChainError::UnknownBlock(1))
    );
    Ok(())
}

#[test]
fn pruning_is_idempotent() -> Result<()> {
    let mut fx = Fixture::new()?;
    for k in 0..4u64 {
        let t = fx
            .operator
            .transfer(&fx.alice, ALICE_SLOT, BOB_SLOT, 1, None);
        fx.commit(k, vec![t])?;
    }

    fx.chain.prune_blocks_after(2);
    let snapshot: Vec<_> = (0..4u64).map(|k| fx.chain.block(k).cloned()).collect();

    // A later prune at or above the same height changes nothing.
    fx.chain.prune_blocks_after(3);
    fx.chain.prune_blocks_after(2);
    let after: Vec<_> = (0..4u64).map(|k| fx.chain.block(k).cloned()).collect();
    assert_eq!(snapshot, after);

    assert_eq!(fx.chain.current_block_number(), Some(3));
    assert!(!fx.is_pruned(1));
    assert!(fx.is_pruned(2));
    assert!(fx.is_pruned(3));
    Ok(())
}
