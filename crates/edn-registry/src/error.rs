//! Error types for identity registry operations.

use thiserror::Error;

/// Errors that can occur while assigning or looking up history identities.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A derived identity is already bound to a different object key.
    #[error("history id {history_id} already assigned to {existing}, refusing {key}")]
    IdentityCollision {
        key: String,
        existing: String,
        history_id: String,
    },

    /// The registry's internal lock was poisoned by a panicking writer.
    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
