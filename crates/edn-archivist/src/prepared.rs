use edn_types::{
    AttributeAdapter, HistoryId, Metadata, ObjectData, ObjectKey, ReferencedData, VersionId,
};

/// What a prepared snapshot remembers about the working object.
///
/// Only the key and the references discovered on it are kept; the working
/// object itself stays with the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct OriginalInfo {
    pub key: ObjectKey,
    pub inside_refs: Vec<AttributeAdapter>,
    pub outside_refs: Vec<AttributeAdapter>,
}

/// Transaction-scoped bundle produced by
/// [`Archivist::prepare`](crate::Archivist::prepare).
///
/// The registration flag is captured at preparation time and never
/// re-queried. A bundle is committed by the first successful `register` or
/// `save`; afterwards `register` is a no-op and `save` is rejected.
#[derive(Clone, Debug)]
pub struct PreparedSnapshot {
    pub(crate) history_id: HistoryId,
    pub(crate) original: OriginalInfo,
    pub(crate) clone: ObjectData,
    pub(crate) referenced_data: ReferencedData,
    pub(crate) metadata: Metadata,
    pub(crate) is_registered: bool,
    pub(crate) committed: bool,
}

impl PreparedSnapshot {
    pub fn history_id(&self) -> &HistoryId {
        &self.history_id
    }

    pub fn original(&self) -> &OriginalInfo {
        &self.original
    }

    pub fn clone_data(&self) -> &ObjectData {
        &self.clone
    }

    pub fn referenced_data(&self) -> &ReferencedData {
        &self.referenced_data
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Whether the history existed when the bundle was prepared.
    pub fn is_registered(&self) -> bool {
        self.is_registered
    }

    /// Version number the clone will be stored under.
    pub fn version_id(&self) -> VersionId {
        self.clone.object.version_id().unwrap_or(VersionId::INITIAL)
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn object_name(&self) -> String {
        self.original.key.to_string()
    }
}
