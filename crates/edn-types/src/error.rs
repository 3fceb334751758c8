use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("empty object key")]
    EmptyKey,

    #[error("attribute owner {owner} not found while resolving '{attribute}'")]
    UnknownOwner { owner: String, attribute: String },
}
