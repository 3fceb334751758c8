//! Archivist core for Editions.
//!
//! The [`Archivist`] turns a live [`VersionedObject`] into immutable,
//! self-contained version records and reconstructs any of them on demand:
//!
//! - [`Archivist::prepare`] builds a [`PreparedSnapshot`] (clone, referenced
//!   data, stamped metadata) without touching the store.
//! - [`Archivist::register`] and [`Archivist::save`] commit a snapshot as the
//!   first or next record of the object's history.
//! - [`Archivist::retrieve`], [`Archivist::get_history`] and
//!   [`Archivist::query_history`] reconstruct versions lazily through a
//!   [`LazyHistory`].
//!
//! Which attributes travel by reference, and what happens to a clone on the
//! way in and out, is decided by a [`Modifier`].

pub mod archivist;
pub mod capability;
mod clone;
pub mod config;
pub mod error;
pub mod history;
pub mod hooks;
pub mod prepared;
mod reference;

#[cfg(test)]
mod test_support;

pub use archivist::Archivist;
pub use capability::{ActorProvider, Clock, FixedClock, StaticActor, SystemClock};
pub use config::{ArchivistConfig, ModifierConfig};
pub use error::{ArchivistError, ArchivistResult, HookError};
pub use history::{HistoryIter, LazyHistory, VersionRecord};
pub use hooks::{
    CloneDecision, CloneStrategy, DeepCopy, DiscoveredRefs, Modifier, RetrieveOutcome,
    StandardModifier,
};
pub use prepared::{OriginalInfo, PreparedSnapshot};

// Re-export key types
pub use edn_registry::{IdentityRegistry, InMemoryIdentityRegistry};
pub use edn_store::{HistoryStore, InMemoryHistoryStore, StoreToken};
pub use edn_types::{
    HistoryId, ObjectKey, PreserveSpec, PrincipalId, Selector, SysMetadataRequest, VersionId,
    VersionedObject,
};
