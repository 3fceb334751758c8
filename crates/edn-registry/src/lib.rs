//! Identity registry for Editions.
//!
//! The registry is the only component allowed to hand out [`HistoryId`]s.
//! Each working object, named by its [`ObjectKey`], is assigned a history
//! identity the first time it is registered. Later registrations of the same
//! key return the same identity, forever.
//!
//! # Modules
//!
//! - [`error`] — Error types for registry operations
//! - [`traits`] — The [`IdentityRegistry`] trait defining the interface
//! - [`memory`] — In-memory [`InMemoryIdentityRegistry`] for tests and embedding
//!
//! [`HistoryId`]: edn_types::HistoryId
//! [`ObjectKey`]: edn_types::ObjectKey

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RegistryError, Result};
pub use memory::InMemoryIdentityRegistry;
pub use traits::IdentityRegistry;
