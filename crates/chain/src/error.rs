//! Error taxonomy of the settlement core.
//!
//! Every entry point is transactional: an `Err` means the call had no
//! effect. A successful fraud proof is NOT an error even though it deletes
//! blocks; detected fraud returns `Ok` after pruning, and only a failed
//! challenge surfaces as [`ChainError::NoFraudDetected`].

use rollup_smt::SmtError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    // Commit path.
    #[error("Only the committer may submit blocks")]
    NotCommitter,
    #[error("Wrong block number")]
    WrongBlockNumber,

    // Admin surface.
    #[error("caller is not the owner")]
    NotOwner,
    #[error("caller is not the rollup chain")]
    NotRollupChain,
    #[error("rollup chain address is not bound")]
    ChainNotBound,
    #[error("validator set must not be empty")]
    EmptyValidatorSet,

    // Validator signatures.
    #[error("expected {expected} signatures, got {got}")]
    SignatureCountMismatch { expected: usize, got: usize },
    #[error("signature at validator index {0} is invalid")]
    InvalidValidatorSignature(usize),
    #[error("signature threshold not met: {valid} of {total}")]
    ThresholdNotMet { valid: usize, total: usize },

    // Fraud-proof caller errors.
    #[error("block {0} does not exist or is pruned")]
    UnknownBlock(u64),
    #[error("transition is not included in its claimed block")]
    MissingInclusion,
    #[error("transitions are not adjacent")]
    NotSequential,
    #[error("pre-state transition does not decode")]
    InvalidPreTransition,
    #[error("supplied slots do not match the transition access list")]
    AccessListMismatch,
    #[error("storage witness rejected: {0}")]
    Witness(#[from] SmtError),

    // Failed challenge.
    #[error("No fraud detected")]
    NoFraudDetected,

    // Token registry.
    #[error("token address is zero")]
    ZeroTokenAddress,

    // Account registry.
    #[error("account is already registered")]
    AccountAlreadyRegistered,
    #[error("registration signature is invalid")]
    InvalidRegistrationSignature,
}
