//! Foundation types for Editions.
//!
//! This crate provides the identity, version, temporal, metadata and object
//! graph types shared by every Editions crate.
//!
//! # Key Types
//!
//! - [`HistoryId`] — Durable identity grouping all versions of one object
//! - [`ObjectKey`] — The host application's identity for a working object
//! - [`VersionId`] / [`Selector`] — Version numbers and version selection
//! - [`VersionedObject`] — The structured, identity-bearing object graph
//! - [`AttributeAdapter`] / [`VersionAwareReference`] — By-value references
//! - [`Metadata`] — Stamped system metadata plus opaque application metadata
//! - [`PreserveSpec`] — What a retrieval keeps from the working state

pub mod error;
pub mod identity;
pub mod metadata;
pub mod object;
pub mod preserve;
pub mod temporal;
pub mod version;

pub use error::TypeError;
pub use identity::{HistoryId, ObjectKey, PrincipalId};
pub use metadata::{Metadata, SysMetadata, SysMetadataRequest};
pub use object::{
    Attribute, AttributeAdapter, ObjectData, ReferencedAttribute, ReferencedData,
    VersionAwareReference, VersionedObject,
};
pub use preserve::PreserveSpec;
pub use temporal::{ModificationMarker, Timestamp};
pub use version::{LocationId, Selector, VersionId};
