//! Main-chain account registry: signature-gated enrollment.
//!
//! A user proves control of an address by signing the registration message
//! with that address's key. The registry is an independent singleton; the
//! settlement core never calls into it.

use std::collections::HashSet;

use alloy_primitives::Address;
use alloy_sol_types::SolValue;
use rollup_core::signature::recover_signer;
use tracing::info;

use crate::error::ChainError;
use crate::events::{ChainEvent, EventLog};

/// Message a user signs to enroll: `(registry_address, "register",
/// account)`, ABI-encoded, under the standard prefix flow.
pub fn registration_message(registry: Address, account: Address) -> Vec<u8> {
    (registry, "register".to_string(), account).abi_encode()
}

#[derive(Debug)]
pub struct AccountRegistry {
    address: Address,
    registered: HashSet<Address>,
    events: EventLog,
}

impl AccountRegistry {
    /// `address` is this registry's own address, the domain of the
    /// registration message.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            registered: HashSet::new(),
            events: EventLog::default(),
        }
    }

    /// Enroll `account`. The signature must be `account`'s own, over the
    /// registration message.
    pub fn register(&mut self, account: Address, signature: &[u8]) -> Result<(), ChainError> {
        if self.registered.contains(&account) {
            return Err(ChainError::AccountAlreadyRegistered);
        }
        let message = registration_message(self.address, account);
        if recover_signer(&message, signature) != Ok(account) {
            return Err(ChainError::InvalidRegistrationSignature);
        }
        self.registered.insert(account);
        info!(account = %account, "account registered");
        self.events.emit(ChainEvent::AccountRegistered { account });
        Ok(())
    }

    pub fn is_registered(&self, account: Address) -> bool {
        self.registered.contains(&account)
    }

    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rollup_core::signature::{address_of, sign_message};

    const REGISTRY: Address = Address::repeat_byte(0x0e);

    #[test]
    fn self_signed_registration_succeeds_once() {
        let key = SigningKey::from_slice(&[0x21; 32]).unwrap();
        let account = address_of(key.verifying_key());
        let signature =
            sign_message(&key, &registration_message(REGISTRY, account)).unwrap();

        let mut registry = AccountRegistry::new(REGISTRY);
        registry.register(account, &signature).unwrap();
        assert!(registry.is_registered(account));
        assert_eq!(
            registry.drain_events(),
            vec![ChainEvent::AccountRegistered { account }]
        );

        assert_eq!(
            registry.register(account, &signature),
            Err(ChainError::AccountAlreadyRegistered)
        );
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let key = SigningKey::from_slice(&[0x21; 32]).unwrap();
        let other = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let account = address_of(key.verifying_key());
        let signature =
            sign_message(&other, &registration_message(REGISTRY, account)).unwrap();

        let mut registry = AccountRegistry::new(REGISTRY);
        assert_eq!(
            registry.register(account, &signature),
            Err(ChainError::InvalidRegistrationSignature)
        );
        assert!(!registry.is_registered(account));
    }
}
