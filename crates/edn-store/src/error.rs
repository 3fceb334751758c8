use edn_types::{HistoryId, Selector};

/// Errors from history store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The history does not exist.
    #[error("history {0} is not registered")]
    Unregistered(HistoryId),

    /// `register` was called for a history that already exists.
    #[error("history {0} is already registered")]
    AlreadyRegistered(HistoryId),

    /// The selector does not match any record of the history.
    #[error("version {selector} not found in history {history_id}")]
    NotFound {
        history_id: HistoryId,
        selector: Selector,
    },

    /// The appended clone does not carry the next contiguous version number.
    #[error("version conflict in {history_id}: expected version {expected}, got {found:?}")]
    VersionConflict {
        history_id: HistoryId,
        expected: u64,
        found: Option<u64>,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record data is malformed or fails its integrity check.
    #[error("corrupt record in {history_id}: {reason}")]
    Corrupt {
        history_id: HistoryId,
        reason: String,
    },

    /// Any other backend failure (poisoned locks, I/O, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
