//! In-memory identity registry for testing and embedding.
//!
//! [`InMemoryIdentityRegistry`] keeps both directions of the key/identity
//! mapping in `HashMap`s behind one `RwLock`. Its contents can be exported to
//! and restored from JSON so that assignments outlive the process.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use edn_types::{HistoryId, ObjectKey};

use crate::error::{RegistryError, Result};
use crate::traits::IdentityRegistry;

#[derive(Debug, Default)]
struct RegistryState {
    by_key: HashMap<ObjectKey, HistoryId>,
    by_id: HashMap<HistoryId, ObjectKey>,
    next_sequence: u64,
}

/// Serialized form of the registry.
#[derive(Debug, Serialize, Deserialize)]
struct RegistrySnapshot {
    next_sequence: u64,
    assignments: Vec<(ObjectKey, HistoryId)>,
}

/// An in-memory implementation of [`IdentityRegistry`].
///
/// Identities are derived from the object key and a monotonically
/// increasing assignment sequence, so a key that is deleted and later
/// re-created by the host application would still receive a fresh identity
/// if the registry entry were dropped.
#[derive(Debug, Default)]
pub struct InMemoryIdentityRegistry {
    inner: RwLock<RegistryState>,
}

impl InMemoryIdentityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of assigned identities.
    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.by_key.len()).unwrap_or(0)
    }

    /// Returns `true` if no identity has been assigned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export all assignments as JSON.
    pub fn to_json(&self) -> Result<String> {
        let state = self.read_state()?;
        let mut assignments: Vec<(ObjectKey, HistoryId)> = state
            .by_key
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        assignments.sort();
        let snapshot = RegistrySnapshot {
            next_sequence: state.next_sequence,
            assignments,
        };
        serde_json::to_string(&snapshot).map_err(|e| RegistryError::Serialization(e.to_string()))
    }

    /// Restore a registry previously exported with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: RegistrySnapshot =
            serde_json::from_str(json).map_err(|e| RegistryError::Serialization(e.to_string()))?;
        let mut state = RegistryState {
            next_sequence: snapshot.next_sequence,
            ..Default::default()
        };
        for (key, id) in snapshot.assignments {
            if let Some(existing) = state.by_id.get(&id) {
                return Err(RegistryError::IdentityCollision {
                    key: key.to_string(),
                    existing: existing.to_string(),
                    history_id: id.to_string(),
                });
            }
            state.by_id.insert(id, key.clone());
            state.by_key.insert(key, id);
        }
        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, RegistryState>> {
        self.inner
            .read()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))
    }
}

impl IdentityRegistry for InMemoryIdentityRegistry {
    fn register(&self, key: &ObjectKey) -> Result<HistoryId> {
        let mut state = self
            .inner
            .write()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;

        if let Some(id) = state.by_key.get(key) {
            return Ok(*id);
        }

        let sequence = state.next_sequence;
        let id = HistoryId::derive(key, sequence);
        if let Some(existing) = state.by_id.get(&id) {
            return Err(RegistryError::IdentityCollision {
                key: key.to_string(),
                existing: existing.to_string(),
                history_id: id.to_string(),
            });
        }

        state.next_sequence += 1;
        state.by_key.insert(key.clone(), id);
        state.by_id.insert(id, key.clone());
        debug!(key = %key, history_id = %id, sequence, "assigned history id");
        Ok(id)
    }

    fn query_identity(&self, key: &ObjectKey) -> Result<Option<HistoryId>> {
        Ok(self.read_state()?.by_key.get(key).copied())
    }

    fn query_key(&self, history_id: &HistoryId) -> Result<Option<ObjectKey>> {
        Ok(self.read_state()?.by_id.get(history_id).cloned())
    }

    fn assignments(&self) -> Result<Vec<(ObjectKey, HistoryId)>> {
        let state = self.read_state()?;
        let mut result: Vec<(ObjectKey, HistoryId)> = state
            .by_key
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }
}
