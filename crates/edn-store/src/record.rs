use std::fmt;

use serde::{Deserialize, Serialize};

use edn_types::{HistoryId, Metadata, ObjectData, ReferencedData, VersionId};

use crate::error::{StoreError, StoreResult};

/// One version of a history as persisted by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredVersion {
    /// The storage-safe clone plus the references discovered on it.
    pub object: ObjectData,
    /// Attributes persisted by reference rather than inside the clone.
    pub referenced_data: ReferencedData,
    pub metadata: Metadata,
}

impl StoredVersion {
    pub fn new(object: ObjectData, referenced_data: ReferencedData, metadata: Metadata) -> Self {
        Self {
            object,
            referenced_data,
            metadata,
        }
    }

    /// Version number carried by the stored clone.
    pub fn version_id(&self) -> Option<VersionId> {
        self.object.object.version_id()
    }

    /// Encode for storage.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a record previously produced by [`encode`](Self::encode).
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Opaque receipt for a successful `register` or `save`.
///
/// The token is the BLAKE3 content hash of the encoded record, domain
/// separated by history. Callers may compare and display tokens but should not
/// rely on their structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreToken([u8; 32]);

impl StoreToken {
    /// Compute the token for an encoded record of `history_id`.
    pub fn compute(history_id: &HistoryId, encoded: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"edn-record-v1:");
        hasher.update(history_id.as_bytes());
        hasher.update(encoded);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for StoreToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreToken({})", self.short_hex())
    }
}

impl fmt::Display for StoreToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
