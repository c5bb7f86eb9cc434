//! On-chain settlement core of the optimistic token rollup.
//!
//! Operators batch sidechain transactions into blocks and commit only a
//! Merkle root per block; nothing is validated at commit time. Any
//! observer who can show that one committed transition was evaluated
//! wrongly calls [`RollupChain::prove_transition_invalid`], which replays
//! that single transition against verified storage witnesses and prunes
//! the offending block and all its descendants when the operator's claim
//! does not hold up.

pub mod accounts;
pub mod block;
pub mod chain;
pub mod error;
pub mod events;
pub mod tokens;
pub mod validators;

pub use accounts::AccountRegistry;
pub use block::BlockEntry;
pub use chain::RollupChain;
pub use error::ChainError;
pub use events::ChainEvent;
pub use tokens::TokenRegistry;
pub use validators::{block_message, CommitterSink, ThresholdMode, ValidatorRegistry};
