//! Error types for proof construction, decoding and state tracking.
//!
//! A failed verification is not an exceptional outcome. Sub-protocol verifiers
//! report it as [`ProofError::VerificationFailed`], and the join-split verifier
//! collapses every failure into a plain `false`.
use curve25519_dalek::scalar::Scalar;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("set is too small")]
    SetIsTooSmall,
    #[error("set is too large")]
    SetIsTooLarge,
    #[error("index out of bounds")]
    IndexOutOfBounds,
    #[error("proof has an invalid size")]
    InvalidProofSize,
    #[error("invalid scalar: {0:?}")]
    InvalidScalar(Scalar),
    #[error("invalid point encoding")]
    InvalidPoint,
    #[error("proof verification failed")]
    VerificationFailed,
    #[error("proof contains an invalid point")]
    VerificationError,
    #[error("coin opening does not match the referenced commitment")]
    OpeningMismatch,
    #[error("input lengths do not match")]
    InvalidInputLength,
    #[error("amount is out of range")]
    ValueOutOfRange,
    #[error("too many outputs for a single range proof")]
    TooManyOutputs,
    #[error("auxiliary key has an invalid length")]
    InvalidKeyLength,
    #[error("unknown coin group {0}")]
    UnknownGroup(u32),
    #[error("set hash does not match group {0}")]
    SetHashMismatch(u32),
    #[error("serial number revealed twice")]
    DuplicateSerial,
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("malformed encoding")]
    FormatError,
}

pub type ProofResult<T> = Result<T, ProofError>;

/// Failures of the anonymity-set and serial-number tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("coin is not a valid non-identity group element")]
    InvalidCoin,
    #[error("coin with tag {0:02x?} already exists")]
    DuplicateCoin([u8; 32]),
    #[error("serial number already spent")]
    SerialAlreadySpent,
    #[error("height {height} is below the last recorded height {last}")]
    HeightRegression { height: u32, last: u32 },
    #[error("unknown coin group {0}")]
    UnknownGroup(u32),
}

pub type StateResult<T> = Result<T, StateError>;
