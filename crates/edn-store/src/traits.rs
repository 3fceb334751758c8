use edn_types::{HistoryId, Metadata, ModificationMarker, ObjectData, ReferencedData, Selector};

use crate::error::StoreResult;
use crate::record::{StoreToken, StoredVersion};

/// Durable, append-only store of per-identity version histories.
///
/// All implementations must satisfy these invariants:
/// - Records are immutable once appended.
/// - `register` creates a history with its first record (version 0) and fails
///   with `AlreadyRegistered` if the history exists.
/// - `save` appends to an existing history and fails with `Unregistered`
///   otherwise.
/// - Appends whose clone does not carry the next contiguous version number
///   fail with `VersionConflict`. This is the only guard against concurrent
///   writers racing on one history.
/// - Readers observe either the full pre-append or the full post-append
///   history, never a partial record.
pub trait HistoryStore: Send + Sync {
    /// Whether a history exists for `history_id`.
    fn is_registered(&self, history_id: &HistoryId) -> StoreResult<bool>;

    /// Create the history with its first record.
    fn register(
        &self,
        history_id: &HistoryId,
        object: &ObjectData,
        referenced_data: &ReferencedData,
        metadata: &Metadata,
    ) -> StoreResult<StoreToken>;

    /// Append a record to an existing history.
    fn save(
        &self,
        history_id: &HistoryId,
        object: &ObjectData,
        referenced_data: &ReferencedData,
        metadata: &Metadata,
    ) -> StoreResult<StoreToken>;

    /// Open a lazy handle on a history.
    ///
    /// Fails with `Unregistered` if the history does not exist.
    fn history(&self, history_id: &HistoryId) -> StoreResult<Box<dyn StoredHistory + '_>>;

    /// All histories known to the store.
    fn histories(&self) -> StoreResult<Vec<HistoryId>>;

    /// Modification marker recorded on the clone stored under `selector`.
    fn modification_marker(
        &self,
        history_id: &HistoryId,
        selector: Selector,
    ) -> StoreResult<ModificationMarker> {
        let record = self.history(history_id)?.get(selector)?;
        Ok(record.object.object.modified())
    }

    /// The most recent record of a history.
    fn retrieve_latest(&self, history_id: &HistoryId) -> StoreResult<StoredVersion> {
        self.history(history_id)?.get(Selector::Latest)
    }
}

/// Lazy, indexable view over one stored history.
///
/// Length and records are read from the store on every call; nothing is
/// cached in the handle.
pub trait StoredHistory {
    fn history_id(&self) -> &HistoryId;

    /// Current number of records.
    fn len(&self) -> StoreResult<u64>;

    /// Decode the record picked by `selector`.
    ///
    /// Fails with `NotFound` when the selector is out of range.
    fn get(&self, selector: Selector) -> StoreResult<StoredVersion>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
