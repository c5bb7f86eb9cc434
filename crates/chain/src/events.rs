//! Observable event stream.
//!
//! Off-chain indexers follow these events instead of reading state, so the
//! set and the field layout are part of the external interface. Each
//! component accumulates its events in an [`EventLog`] the embedder drains
//! after every call.

use std::collections::VecDeque;

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    CommitterChanged {
        new_committer: Address,
    },
    TokenRegistered {
        token_address: Address,
        token_index: u32,
    },
    AccountRegistered {
        account: Address,
    },
    RollupBlockCommitted {
        block_number: u64,
        transitions: Vec<Bytes>,
    },
    /// One per transition inside a commit; a debug stream for operators.
    Transition {
        data: Bytes,
    },
    /// One per evaluator call during a fraud proof.
    DecodedTransition {
        success: bool,
        return_data: Bytes,
    },
}

/// FIFO event buffer.
#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<ChainEvent>,
}

impl EventLog {
    pub fn emit(&mut self, event: ChainEvent) {
        self.events.push_back(event);
    }

    /// Remove and return everything emitted so far, oldest first.
    pub fn drain(&mut self) -> Vec<ChainEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
