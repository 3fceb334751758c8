use thiserror::Error;

use edn_registry::RegistryError;
use edn_store::StoreError;
use edn_types::{Selector, TypeError};

/// Failures raised by attribute hooks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("attribute resolution failed: {0}")]
    Attribute(#[from] TypeError),

    #[error("hook rejected object: {0}")]
    Rejected(String),
}

/// Archivist error family.
///
/// Store and registry failures never leak out as their own types; they are
/// translated here with the object they concern.
#[derive(Debug, Error)]
pub enum ArchivistError {
    #[error("object {object} is not registered")]
    Unregistered { object: String },

    #[error("failed to register {object}: {reason}")]
    Register { object: String, reason: String },

    #[error("failed to save {object}: {reason}")]
    Save { object: String, reason: String },

    #[error("version {selector} of {object} not found")]
    Retrieve { object: String, selector: Selector },

    #[error("history store failure for {object}: {reason}")]
    Storage { object: String, reason: String },

    #[error("identity registry failure for {object}: {reason}")]
    Registry { object: String, reason: String },

    #[error("attribute hook failed for {object}: {source}")]
    Hook { object: String, source: HookError },

    #[error("clone of {object} exceeds maximum depth {limit}")]
    CloneDepthExceeded { object: String, limit: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ArchivistError {
    /// Translate a store failure on a read path.
    pub(crate) fn from_store(object: impl ToString, err: StoreError) -> Self {
        match err {
            StoreError::Unregistered(_) => Self::Unregistered {
                object: object.to_string(),
            },
            other => Self::Storage {
                object: object.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn from_registry(object: impl ToString, err: RegistryError) -> Self {
        Self::Registry {
            object: object.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn from_hook(object: impl ToString, err: HookError) -> Self {
        Self::Hook {
            object: object.to_string(),
            source: err,
        }
    }
}

pub type ArchivistResult<T> = Result<T, ArchivistError>;
