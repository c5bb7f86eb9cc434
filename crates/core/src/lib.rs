//! Core data model and transition evaluation for the token rollup.
//!
//! This crate is shared between the on-chain settlement core and any
//! off-chain software that needs to reproduce its encodings: account
//! leaves, tagged transition records, signed-message formats, and the
//! deterministic transition evaluator consulted during fraud proofs.

pub mod evaluator;
pub mod signature;
pub mod transition;
pub mod types;

pub use evaluator::{EvaluatorError, PureEvaluator, TransitionEvaluator};
pub use signature::SignatureError;
pub use transition::Transition;
pub use types::{
    AccountInfo, CodecError, IncludedStorageSlot, IncludedTransition, StorageSlot,
    TransitionInclusionProof,
};
