//! Lazy, indexable views over one object's history.
//!
//! Nothing is materialized up front: [`LazyHistory::len`] asks the store each
//! time, and every [`LazyHistory::get`] decodes, reattaches and post-processes
//! exactly one record into a fresh [`VersionRecord`].

use std::collections::BTreeMap;

use tracing::debug;

use edn_store::{StoreError, StoredHistory, StoredVersion};
use edn_types::{
    Attribute, AttributeAdapter, HistoryId, Metadata, ObjectData, PreserveSpec, Selector,
    SysMetadata, TypeError, VersionId, VersionedObject,
};

use crate::archivist::Archivist;
use crate::error::{ArchivistError, ArchivistResult};

/// One reconstructed historical version.
///
/// Each record is freshly built for its caller and shares nothing with other
/// records or with the working object.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionRecord {
    pub object: ObjectData,
    pub refs_to_be_deleted: Vec<AttributeAdapter>,
    pub preserved_data: BTreeMap<String, Attribute>,
    pub metadata: Metadata,
}

impl VersionRecord {
    pub fn version_id(&self) -> Option<VersionId> {
        self.object.object.version_id()
    }

    pub fn sys_metadata(&self) -> &SysMetadata {
        &self.metadata.sys_metadata
    }

    pub fn app_metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.app_metadata.as_ref()
    }

    /// Write the preserved working values over the historical ones.
    pub fn apply_preserved(&mut self) {
        for (name, value) in &self.preserved_data {
            self.object.object.set_attribute(name.clone(), value.clone());
        }
    }

    /// Drop every reference listed in `refs_to_be_deleted`.
    pub fn remove_deleted_refs(&mut self) -> Result<(), TypeError> {
        for adapter in &self.refs_to_be_deleted {
            adapter.take(&mut self.object.object)?;
        }
        Ok(())
    }

    /// The reconstructed object, consuming the record.
    pub fn into_object(self) -> VersionedObject {
        self.object.object
    }
}

/// Lazy history of one working object.
pub struct LazyHistory<'a> {
    archivist: &'a Archivist,
    working: &'a VersionedObject,
    inner: Box<dyn StoredHistory + 'a>,
    preserve: PreserveSpec,
}

impl<'a> LazyHistory<'a> {
    pub(crate) fn new(
        archivist: &'a Archivist,
        working: &'a VersionedObject,
        inner: Box<dyn StoredHistory + 'a>,
        preserve: PreserveSpec,
    ) -> Self {
        Self {
            archivist,
            working,
            inner,
            preserve,
        }
    }

    pub fn history_id(&self) -> &HistoryId {
        self.inner.history_id()
    }

    pub fn preserve(&self) -> &PreserveSpec {
        &self.preserve
    }

    /// Number of stored versions right now.
    pub fn len(&self) -> ArchivistResult<u64> {
        self.inner
            .len()
            .map_err(|e| ArchivistError::from_store(self.working.key(), e))
    }

    pub fn is_empty(&self) -> ArchivistResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Reconstruct the version picked by `selector`.
    ///
    /// A selector past the end fails with [`ArchivistError::Retrieve`].
    pub fn get(&self, selector: Selector) -> ArchivistResult<VersionRecord> {
        self.fetch(selector)?
            .ok_or_else(|| ArchivistError::Retrieve {
                object: self.working.key().to_string(),
                selector,
            })
    }

    /// Iterate from version 0 until the store runs out of records.
    pub fn iter(&self) -> HistoryIter<'_, 'a> {
        HistoryIter {
            history: self,
            next: 0,
            done: false,
        }
    }

    /// `Ok(None)` means the store has no record under `selector`.
    fn fetch(&self, selector: Selector) -> ArchivistResult<Option<VersionRecord>> {
        let object = self.working.key();
        let stored = match self.inner.get(selector) {
            Ok(stored) => stored,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(ArchivistError::from_store(object, e)),
        };
        let StoredVersion {
            object: mut data,
            referenced_data,
            metadata,
        } = stored;

        let modifier = self.archivist.modifier();
        modifier
            .reattach(&mut data.object, &referenced_data)
            .map_err(|e| ArchivistError::from_hook(object, e))?;
        let outcome = modifier
            .after_retrieve(self.working, &mut data, &self.preserve)
            .map_err(|e| ArchivistError::from_hook(object, e))?;

        debug!(
            object = %object,
            history_id = %self.history_id().short_id(),
            selector = %selector,
            version = ?data.object.version_id(),
            "version reconstructed"
        );
        Ok(Some(VersionRecord {
            object: data,
            refs_to_be_deleted: outcome.refs_to_be_deleted,
            preserved_data: outcome.preserved_data,
            metadata,
        }))
    }
}

impl std::fmt::Debug for LazyHistory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyHistory")
            .field("object", self.working.key())
            .field("history_id", self.history_id())
            .field("preserve", &self.preserve)
            .finish()
    }
}

impl<'h, 'a> IntoIterator for &'h LazyHistory<'a> {
    type Item = ArchivistResult<VersionRecord>;
    type IntoIter = HistoryIter<'h, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`LazyHistory`].
///
/// Ends at the first missing version. A failure other than "no such version"
/// is yielded once and ends the iteration.
pub struct HistoryIter<'h, 'a> {
    history: &'h LazyHistory<'a>,
    next: u64,
    done: bool,
}

impl Iterator for HistoryIter<'_, '_> {
    type Item = ArchivistResult<VersionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.history.fetch(Selector::from(self.next)) {
            Ok(Some(record)) => {
                self.next += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for HistoryIter<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use edn_types::{PrincipalId, SysMetadataRequest, Timestamp};
    use serde_json::json;

    use crate::test_support::{archivist, document, save_versions};

    // -----------------------------------------------------------------------
    // Lazy access
    // -----------------------------------------------------------------------

    #[test]
    fn len_tracks_appends_while_open() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);

        let probe = doc.clone();
        let history = fixture
            .archivist
            .get_history(&probe, PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(history.len().unwrap(), 1);

        save_versions(&fixture.archivist, &mut doc, 2);
        assert_eq!(history.len().unwrap(), 3);
    }

    #[test]
    fn get_past_end_is_retrieve_error() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 2);
        let history = fixture
            .archivist
            .get_history(&doc, PreserveSpec::Nothing)
            .unwrap();

        let err = history.get(Selector::from(2)).unwrap_err();
        assert!(matches!(
            err,
            ArchivistError::Retrieve { selector: Selector::Version(VersionId(2)), .. }
        ));
        assert!(history.get(Selector::Latest).is_ok());
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    #[test]
    fn iteration_stops_cleanly_and_restarts() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 3);
        let history = fixture
            .archivist
            .get_history(&doc, PreserveSpec::Nothing)
            .unwrap();

        let versions: Vec<u64> = history
            .iter()
            .map(|r| r.unwrap().version_id().unwrap().value())
            .collect();
        assert_eq!(versions, vec![0, 1, 2]);

        let again: Vec<_> = (&history).into_iter().collect();
        assert_eq!(again.len(), 3);
        assert!(again.iter().all(Result::is_ok));
    }

    #[test]
    fn exhausted_iterator_stays_exhausted() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let history = fixture
            .archivist
            .get_history(&doc, PreserveSpec::Nothing)
            .unwrap();

        let mut iter = history.iter();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    #[test]
    fn records_are_independent() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let history = fixture
            .archivist
            .get_history(&doc, PreserveSpec::Nothing)
            .unwrap();

        let mut first = history.get(Selector::Latest).unwrap();
        first
            .object
            .object
            .set_attribute("title", json!("scribbled").into());
        let second = history.get(Selector::Latest).unwrap();
        assert_eq!(
            second.object.object.attribute("title").and_then(Attribute::as_value),
            Some(&json!("Hello"))
        );
    }

    #[test]
    fn apply_preserved_overwrites_history() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        doc.set_attribute("title", json!("Current").into());

        let mut record = fixture
            .archivist
            .retrieve(&doc, Selector::from(0), PreserveSpec::attributes(["title"]))
            .unwrap();
        assert_eq!(
            record.object.object.attribute("title").and_then(Attribute::as_value),
            Some(&json!("Hello"))
        );
        record.apply_preserved();
        assert_eq!(
            record.into_object().attribute("title").and_then(Attribute::as_value),
            Some(&json!("Current"))
        );
    }

    #[test]
    fn metadata_accessors() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture
            .archivist
            .prepare(
                &mut doc,
                Some(json!({"ticket": 7})),
                SysMetadataRequest::default()
                    .with_comment("first")
                    .with_timestamp(Timestamp(5)),
            )
            .unwrap();
        fixture.archivist.register(&mut prepared).unwrap();

        let record = fixture
            .archivist
            .retrieve(&doc, Selector::Latest, PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(record.sys_metadata().comment, "first");
        assert_eq!(record.sys_metadata().principal, PrincipalId::new("alice"));
        assert_eq!(record.app_metadata(), Some(&json!({"ticket": 7})));
    }
}
