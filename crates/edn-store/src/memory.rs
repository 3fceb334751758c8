use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use edn_types::{HistoryId, Metadata, ObjectData, ReferencedData, Selector};

use crate::error::{StoreError, StoreResult};
use crate::record::{StoreToken, StoredVersion};
use crate::traits::{HistoryStore, StoredHistory};

/// In-memory, HashMap-based history store.
///
/// Intended for tests and embedding. Records are kept encoded and keyed by
/// their [`StoreToken`]; each history is an ordered list of tokens. Every read
/// decodes a fresh record, so retrievals never alias one another.
pub struct InMemoryHistoryStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    histories: HashMap<HistoryId, Vec<StoreToken>>,
    records: HashMap<StoreToken, Vec<u8>>,
}

impl InMemoryHistoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of records across all histories.
    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.read_state()?.records.len())
    }

    /// Total encoded bytes across all records.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        let state = self.read_state()?;
        Ok(state.records.values().map(|r| r.len() as u64).sum())
    }

    /// Check that a history has contiguous version numbers from 0 and that
    /// every record still matches its token.
    pub fn validate_history(&self, history_id: &HistoryId) -> StoreResult<()> {
        let state = self.read_state()?;
        let tokens = state
            .histories
            .get(history_id)
            .ok_or(StoreError::Unregistered(*history_id))?;

        for (index, token) in tokens.iter().enumerate() {
            let encoded = state.records.get(token).ok_or_else(|| StoreError::Corrupt {
                history_id: *history_id,
                reason: format!("record {index} missing"),
            })?;
            if StoreToken::compute(history_id, encoded) != *token {
                return Err(StoreError::Corrupt {
                    history_id: *history_id,
                    reason: format!("record {index} hash mismatch"),
                });
            }
            let record = StoredVersion::decode(encoded)?;
            let found = record.version_id().map(|v| v.value());
            if found != Some(index as u64) {
                return Err(StoreError::VersionConflict {
                    history_id: *history_id,
                    expected: index as u64,
                    found,
                });
            }
        }
        Ok(())
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Backend(format!("store read lock poisoned: {e}")))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Backend(format!("store write lock poisoned: {e}")))
    }

    fn append(
        state: &mut StoreState,
        history_id: &HistoryId,
        record: StoredVersion,
    ) -> StoreResult<StoreToken> {
        let expected = state
            .histories
            .get(history_id)
            .map(|h| h.len() as u64)
            .unwrap_or(0);
        let found = record.version_id().map(|v| v.value());
        if found != Some(expected) {
            return Err(StoreError::VersionConflict {
                history_id: *history_id,
                expected,
                found,
            });
        }

        let encoded = record.encode()?;
        let token = StoreToken::compute(history_id, &encoded);
        state.records.insert(token, encoded);
        state.histories.entry(*history_id).or_default().push(token);
        debug!(history_id = %history_id, version = expected, token = %token.short_hex(), "record appended");
        Ok(token)
    }

    fn read_record(&self, history_id: &HistoryId, selector: Selector) -> StoreResult<StoredVersion> {
        let state = self.read_state()?;
        let tokens = state
            .histories
            .get(history_id)
            .ok_or(StoreError::Unregistered(*history_id))?;
        let version = selector
            .resolve(tokens.len() as u64)
            .ok_or(StoreError::NotFound {
                history_id: *history_id,
                selector,
            })?;
        let token = tokens[version.value() as usize];
        let encoded = state.records.get(&token).ok_or_else(|| StoreError::Corrupt {
            history_id: *history_id,
            reason: format!("record for version {version} missing"),
        })?;
        StoredVersion::decode(encoded)
    }

    fn history_len(&self, history_id: &HistoryId) -> StoreResult<u64> {
        let state = self.read_state()?;
        state
            .histories
            .get(history_id)
            .map(|h| h.len() as u64)
            .ok_or(StoreError::Unregistered(*history_id))
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn is_registered(&self, history_id: &HistoryId) -> StoreResult<bool> {
        Ok(self.read_state()?.histories.contains_key(history_id))
    }

    fn register(
        &self,
        history_id: &HistoryId,
        object: &ObjectData,
        referenced_data: &ReferencedData,
        metadata: &Metadata,
    ) -> StoreResult<StoreToken> {
        let mut state = self.write_state()?;
        if state.histories.contains_key(history_id) {
            return Err(StoreError::AlreadyRegistered(*history_id));
        }
        let record = StoredVersion::new(object.clone(), referenced_data.clone(), metadata.clone());
        Self::append(&mut state, history_id, record)
    }

    fn save(
        &self,
        history_id: &HistoryId,
        object: &ObjectData,
        referenced_data: &ReferencedData,
        metadata: &Metadata,
    ) -> StoreResult<StoreToken> {
        let mut state = self.write_state()?;
        if !state.histories.contains_key(history_id) {
            return Err(StoreError::Unregistered(*history_id));
        }
        let record = StoredVersion::new(object.clone(), referenced_data.clone(), metadata.clone());
        Self::append(&mut state, history_id, record)
    }

    fn history(&self, history_id: &HistoryId) -> StoreResult<Box<dyn StoredHistory + '_>> {
        if !self.is_registered(history_id)? {
            return Err(StoreError::Unregistered(*history_id));
        }
        Ok(Box::new(MemoryHistory {
            store: self,
            history_id: *history_id,
        }))
    }

    fn histories(&self) -> StoreResult<Vec<HistoryId>> {
        let state = self.read_state()?;
        let mut ids: Vec<HistoryId> = state.histories.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let histories = self.inner.read().map(|s| s.histories.len()).unwrap_or(0);
        f.debug_struct("InMemoryHistoryStore")
            .field("history_count", &histories)
            .field("record_count", &self.record_count().ok())
            .finish()
    }
}

/// Lazy handle on one history of an [`InMemoryHistoryStore`].
struct MemoryHistory<'a> {
    store: &'a InMemoryHistoryStore,
    history_id: HistoryId,
}

impl StoredHistory for MemoryHistory<'_> {
    fn history_id(&self) -> &HistoryId {
        &self.history_id
    }

    fn len(&self) -> StoreResult<u64> {
        self.store.history_len(&self.history_id)
    }

    fn get(&self, selector: Selector) -> StoreResult<StoredVersion> {
        self.store.read_record(&self.history_id, selector)
    }
}
