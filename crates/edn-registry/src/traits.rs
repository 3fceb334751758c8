//! The [`IdentityRegistry`] trait defining the identity assignment interface.

use edn_types::{HistoryId, ObjectKey};

use crate::error::Result;

/// Assigns and looks up durable history identities.
///
/// Implementations must be thread-safe (`Send + Sync`) and must guarantee:
///
/// - `register` is idempotent: a key always maps to the same identity.
/// - An identity is never reassigned to another key.
/// - Assignments survive for as long as the backing storage does.
pub trait IdentityRegistry: Send + Sync {
    /// Return the identity for `key`, assigning one if none exists yet.
    fn register(&self, key: &ObjectKey) -> Result<HistoryId>;

    /// Look up the identity for `key` without assigning one.
    fn query_identity(&self, key: &ObjectKey) -> Result<Option<HistoryId>>;

    /// Reverse lookup: which object key owns `history_id`.
    fn query_key(&self, history_id: &HistoryId) -> Result<Option<ObjectKey>>;

    /// All assignments, sorted by object key.
    fn assignments(&self) -> Result<Vec<(ObjectKey, HistoryId)>>;

    /// Returns `true` if `key` has an identity.
    fn is_known(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.query_identity(key)?.is_some())
    }
}
