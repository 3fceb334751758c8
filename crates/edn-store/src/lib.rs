//! History storage for Editions.
//!
//! A history store keeps, for every [`HistoryId`], an append-only sequence of
//! version records. Each record holds the storage-safe clone of a working
//! object, the attributes that were persisted by reference, and the stamped
//! metadata. The store is the source of truth for history length and
//! retrieval; the archivist layered on top never caches what it reads.
//!
//! # Storage Backends
//!
//! All backends implement the [`HistoryStore`] trait:
//!
//! - [`InMemoryHistoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Records are immutable once appended.
//! 2. Version numbers within a history are contiguous from 0; an append whose
//!    clone carries any other version is rejected.
//! 3. Every read returns a freshly decoded record; callers never share state.
//! 4. `register` creates a history, `save` extends one. Neither does the
//!    other's job.
//! 5. The store never interprets application metadata.
//!
//! [`HistoryId`]: edn_types::HistoryId

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryHistoryStore;
pub use record::{StoreToken, StoredVersion};
pub use traits::{HistoryStore, StoredHistory};
