use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use edn_registry::{IdentityRegistry, InMemoryIdentityRegistry};
use edn_store::{HistoryStore, InMemoryHistoryStore, StoreError, StoreToken};
use edn_types::{
    HistoryId, LocationId, Metadata, ObjectData, PreserveSpec, Selector, SysMetadata,
    SysMetadataRequest, VersionAwareReference, VersionId, VersionedObject,
};

use crate::capability::{ActorProvider, Clock, SystemClock};
use crate::clone::{clone_object, CloneContext, ClonedGraph};
use crate::config::ArchivistConfig;
use crate::error::{ArchivistError, ArchivistResult};
use crate::history::{LazyHistory, VersionRecord};
use crate::hooks::{DeepCopy, Modifier};
use crate::prepared::{OriginalInfo, PreparedSnapshot};
use crate::reference::ReferenceResolver;

/// Orchestrates versioning of working objects over a history store.
///
/// The archivist holds no per-object state. Every durable effect goes
/// through the [`HistoryStore`], which is expected to run inside the
/// caller's transaction and to version-guard concurrent writers.
pub struct Archivist {
    registry: Arc<dyn IdentityRegistry>,
    storage: Arc<dyn HistoryStore>,
    modifier: Arc<dyn Modifier>,
    actor: Arc<dyn ActorProvider>,
    clock: Arc<dyn Clock>,
    config: ArchivistConfig,
}

impl Archivist {
    pub fn new(
        registry: Arc<dyn IdentityRegistry>,
        storage: Arc<dyn HistoryStore>,
        modifier: Arc<dyn Modifier>,
        actor: Arc<dyn ActorProvider>,
    ) -> Self {
        Self {
            registry,
            storage,
            modifier,
            actor,
            clock: Arc::new(SystemClock),
            config: ArchivistConfig::default(),
        }
    }

    /// An archivist over fresh in-memory backends.
    pub fn in_memory(modifier: Arc<dyn Modifier>, actor: Arc<dyn ActorProvider>) -> Self {
        Self::new(
            Arc::new(InMemoryIdentityRegistry::new()),
            Arc::new(InMemoryHistoryStore::new()),
            modifier,
            actor,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: ArchivistConfig) -> ArchivistResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &ArchivistConfig {
        &self.config
    }

    pub fn registry(&self) -> &dyn IdentityRegistry {
        self.registry.as_ref()
    }

    pub fn storage(&self) -> &dyn HistoryStore {
        self.storage.as_ref()
    }

    pub(crate) fn modifier(&self) -> &dyn Modifier {
        self.modifier.as_ref()
    }

    // ---- Snapshot preparation ----

    /// Build a snapshot bundle for `obj` without writing to the store.
    ///
    /// A never-registered object gets its version and location markers
    /// initialized; that is the only change made to `obj`.
    pub fn prepare(
        &self,
        obj: &mut VersionedObject,
        app_metadata: Option<Value>,
        sys_metadata: SysMetadataRequest,
    ) -> ArchivistResult<PreparedSnapshot> {
        let object = obj.key().to_string();
        let history_id = self
            .registry
            .register(obj.key())
            .map_err(|e| ArchivistError::from_registry(&object, e))?;
        let is_registered = self
            .storage
            .is_registered(&history_id)
            .map_err(|e| ArchivistError::from_store(&object, e))?;

        let version = if is_registered {
            let len = self
                .storage
                .history(&history_id)
                .and_then(|h| h.len())
                .map_err(|e| ArchivistError::from_store(&object, e))?;
            VersionId(len)
        } else {
            obj.set_version_id(VersionId::INITIAL);
            obj.set_location_id(LocationId::DEFAULT);
            VersionId::INITIAL
        };

        let obj: &VersionedObject = obj;
        let referenced_data = self
            .modifier
            .referenced_attributes(obj)
            .map_err(|e| ArchivistError::from_hook(&object, e))?;

        let resolver = ReferenceResolver::new(self.registry.as_ref(), self.storage.as_ref());
        let strategy = self.modifier.clone_strategy(obj).unwrap_or(&DeepCopy);
        let ClonedGraph {
            object: mut clone,
            original_refs,
        } = clone_object(
            obj,
            &CloneContext {
                referenced: &referenced_data,
                strategy,
                resolver: &resolver,
                max_depth: self.config.max_clone_depth,
            },
        )?;

        let refs = self
            .modifier
            .before_save(obj, &mut clone)
            .map_err(|e| ArchivistError::from_hook(&object, e))?;
        clone.set_version_id(version);
        clone.set_location_id(LocationId::DEFAULT);

        let metadata = Metadata {
            sys_metadata: SysMetadata::stamp(
                sys_metadata,
                &self.config.default_comment,
                self.clock.now(),
                self.actor.current_actor(),
            ),
            app_metadata,
        };

        debug!(
            object = %object,
            history_id = %history_id.short_id(),
            version = version.value(),
            is_registered,
            inside_refs = refs.inside.len(),
            outside_refs = refs.outside.len(),
            referenced = referenced_data.len(),
            "snapshot prepared"
        );

        Ok(PreparedSnapshot {
            history_id,
            original: OriginalInfo {
                key: obj.key().clone(),
                inside_refs: original_refs.inside,
                outside_refs: original_refs.outside,
            },
            clone: ObjectData::with_refs(clone, refs.inside, refs.outside),
            referenced_data,
            metadata,
            is_registered,
            committed: false,
        })
    }

    // ---- Durable verbs ----

    /// Store the bundle as the first record of a new history.
    ///
    /// Returns `None` without touching the store when the bundle's object was
    /// already registered at preparation time or the bundle was already
    /// committed.
    pub fn register(&self, prepared: &mut PreparedSnapshot) -> ArchivistResult<Option<StoreToken>> {
        if prepared.is_registered || prepared.committed {
            debug!(
                object = %prepared.original.key,
                history_id = %prepared.history_id.short_id(),
                "register skipped"
            );
            return Ok(None);
        }
        self.commit_first(prepared).map(Some)
    }

    /// Append the bundle to its history.
    ///
    /// An unregistered bundle fails with [`ArchivistError::Save`] unless
    /// `autoregister` is set, in which case it is registered instead.
    pub fn save(
        &self,
        prepared: &mut PreparedSnapshot,
        autoregister: bool,
    ) -> ArchivistResult<StoreToken> {
        let object = prepared.object_name();
        if prepared.committed {
            warn!(object = %object, "save rejected: snapshot already committed");
            return Err(ArchivistError::Save {
                object,
                reason: "snapshot already committed".into(),
            });
        }
        if !prepared.is_registered {
            if !autoregister {
                warn!(object = %object, "save rejected: object is not registered");
                return Err(ArchivistError::Save {
                    object,
                    reason: "object is not registered".into(),
                });
            }
            return self.commit_first(prepared);
        }

        let token = self
            .storage
            .save(
                &prepared.history_id,
                &prepared.clone,
                &prepared.referenced_data,
                &prepared.metadata,
            )
            .map_err(|e| ArchivistError::Save {
                object: object.clone(),
                reason: e.to_string(),
            })?;
        prepared.committed = true;
        info!(
            object = %object,
            history_id = %prepared.history_id.short_id(),
            version = prepared.version_id().value(),
            token = %token.short_hex(),
            "version saved"
        );
        Ok(token)
    }

    fn commit_first(&self, prepared: &mut PreparedSnapshot) -> ArchivistResult<StoreToken> {
        let object = prepared.object_name();
        let token = self
            .storage
            .register(
                &prepared.history_id,
                &prepared.clone,
                &prepared.referenced_data,
                &prepared.metadata,
            )
            .map_err(|e| ArchivistError::Register {
                object: object.clone(),
                reason: e.to_string(),
            })?;
        prepared.committed = true;
        info!(
            object = %object,
            history_id = %prepared.history_id.short_id(),
            token = %token.short_hex(),
            "history registered"
        );
        Ok(token)
    }

    // ---- Queries ----

    /// Whether the stored version under `selector` carries the working
    /// object's current modification marker.
    pub fn is_up_to_date(&self, obj: &VersionedObject, selector: Selector) -> ArchivistResult<bool> {
        let history_id = self.known_history(obj)?;
        let stored = match self.storage.modification_marker(&history_id, selector) {
            Ok(marker) => marker,
            Err(StoreError::NotFound { .. }) => {
                return Err(ArchivistError::Retrieve {
                    object: obj.key().to_string(),
                    selector,
                })
            }
            Err(e) => return Err(ArchivistError::from_store(obj.key(), e)),
        };
        Ok(stored == obj.modified())
    }

    /// Reconstruct one version of `obj`.
    pub fn retrieve(
        &self,
        obj: &VersionedObject,
        selector: Selector,
        preserve: PreserveSpec,
    ) -> ArchivistResult<VersionRecord> {
        self.get_history(obj, preserve)?.get(selector)
    }

    /// Lazy history of `obj`. Fails with [`ArchivistError::Unregistered`]
    /// when the object has never been registered.
    pub fn get_history<'a>(
        &'a self,
        obj: &'a VersionedObject,
        preserve: PreserveSpec,
    ) -> ArchivistResult<LazyHistory<'a>> {
        let history_id = self.known_history(obj)?;
        let inner = self
            .storage
            .history(&history_id)
            .map_err(|e| ArchivistError::from_store(obj.key(), e))?;
        Ok(LazyHistory::new(self, obj, inner, preserve))
    }

    /// Like [`get_history`](Self::get_history), but `None` for an
    /// unregistered object.
    pub fn query_history<'a>(
        &'a self,
        obj: &'a VersionedObject,
        preserve: PreserveSpec,
    ) -> ArchivistResult<Option<LazyHistory<'a>>> {
        match self.get_history(obj, preserve) {
            Ok(history) => Ok(Some(history)),
            Err(ArchivistError::Unregistered { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Object type recorded on the latest version of a history.
    pub fn object_type(&self, history_id: &HistoryId) -> ArchivistResult<String> {
        let record = self
            .storage
            .retrieve_latest(history_id)
            .map_err(|e| ArchivistError::from_store(history_id, e))?;
        Ok(record.object.object.object_type().to_string())
    }

    /// Pin `reference` to its target's history and latest stored version.
    pub fn resolve_reference(
        &self,
        reference: &mut VersionAwareReference,
        remove_info: bool,
    ) -> ArchivistResult<()> {
        ReferenceResolver::new(self.registry.as_ref(), self.storage.as_ref())
            .resolve(reference, None, remove_info)
    }

    fn known_history(&self, obj: &VersionedObject) -> ArchivistResult<HistoryId> {
        let object = obj.key().to_string();
        let unregistered = || ArchivistError::Unregistered {
            object: object.clone(),
        };
        let history_id = self
            .registry
            .query_identity(obj.key())
            .map_err(|e| ArchivistError::from_registry(&object, e))?
            .ok_or_else(unregistered)?;
        let registered = self
            .storage
            .is_registered(&history_id)
            .map_err(|e| ArchivistError::from_store(&object, e))?;
        if !registered {
            return Err(unregistered());
        }
        Ok(history_id)
    }
}

impl std::fmt::Debug for Archivist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archivist")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use edn_types::{
        Attribute, AttributeAdapter, ModificationMarker, ObjectKey, PrincipalId, Timestamp,
    };
    use proptest::prelude::*;
    use serde_json::json;

    use crate::capability::{FixedClock, StaticActor};
    use crate::config::ModifierConfig;
    use crate::error::HookError;
    use crate::hooks::{DiscoveredRefs, RetrieveOutcome, StandardModifier};
    use crate::test_support::{
        archivist, archivist_with, document, key, save_versions, store_versions, CLOCK_SECS,
    };

    fn no_meta() -> SysMetadataRequest {
        SysMetadataRequest::default()
    }

    // -----------------------------------------------------------------------
    // Prepare
    // -----------------------------------------------------------------------

    #[test]
    fn prepare_new_object_starts_at_version_zero() {
        let fixture = archivist();
        let mut doc = document();
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        assert!(!prepared.is_registered());
        assert_eq!(prepared.version_id(), VersionId(0));
        assert_eq!(doc.version_id(), Some(VersionId(0)));
        assert_eq!(doc.location_id(), Some(LocationId::DEFAULT));
        assert!(!fixture.store.is_registered(prepared.history_id()).unwrap());
    }

    #[test]
    fn prepare_registered_object_uses_history_length() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 3);

        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert!(prepared.is_registered());
        assert_eq!(prepared.version_id(), VersionId(3));
    }

    #[test]
    fn prepare_is_repeatable_without_writes() {
        let fixture = archivist();
        let mut doc = document();
        let a = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let b = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert_eq!(a.history_id(), b.history_id());
        assert_eq!(a.clone_data(), b.clone_data());
        assert!(fixture.store.histories().unwrap().is_empty());
    }

    #[test]
    fn identity_is_assigned_once() {
        let fixture = archivist();
        let mut doc = document();
        let first = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let mut again = document();
        let second = fixture.archivist.prepare(&mut again, None, no_meta()).unwrap();
        assert_eq!(first.history_id(), second.history_id());
        assert_eq!(fixture.registry.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Metadata stamping
    // -----------------------------------------------------------------------

    #[test]
    fn principal_is_always_the_current_actor() {
        let fixture = archivist();
        let mut doc = document();
        let request = SysMetadataRequest {
            principal: Some(PrincipalId::new("mallory")),
            ..Default::default()
        };
        let prepared = fixture.archivist.prepare(&mut doc, None, request).unwrap();
        assert_eq!(
            prepared.metadata().sys_metadata.principal,
            PrincipalId::new("alice")
        );
    }

    #[test]
    fn timestamp_defaults_to_clock() {
        let fixture = archivist();
        let mut doc = document();
        let stamped = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert_eq!(stamped.metadata().sys_metadata.timestamp, Timestamp(CLOCK_SECS));

        let given = fixture
            .archivist
            .prepare(&mut doc, None, no_meta().with_timestamp(Timestamp(7)))
            .unwrap();
        assert_eq!(given.metadata().sys_metadata.timestamp, Timestamp(7));
    }

    #[test]
    fn comment_and_originator_defaults() {
        let fixture = archivist();
        let mut doc = document();
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert_eq!(prepared.metadata().sys_metadata.comment, "");
        assert!(prepared.metadata().sys_metadata.originator.is_none());

        let configured = archivist_with(StandardModifier::default())
            .archivist
            .with_config(ArchivistConfig {
                default_comment: "autosave".into(),
                ..Default::default()
            })
            .unwrap();
        let prepared = configured.prepare(&mut doc, None, no_meta()).unwrap();
        assert_eq!(prepared.metadata().sys_metadata.comment, "autosave");
    }

    #[test]
    fn app_metadata_passes_through() {
        let fixture = archivist();
        let mut doc = document();
        let app = json!({"workflow": "review", "nested": [1, 2]});
        let prepared = fixture
            .archivist
            .prepare(&mut doc, Some(app.clone()), no_meta())
            .unwrap();
        assert_eq!(prepared.metadata().app_metadata, Some(app));
    }

    #[derive(Default)]
    struct RotatingActor(AtomicUsize);

    impl ActorProvider for RotatingActor {
        fn current_actor(&self) -> PrincipalId {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            PrincipalId::new(format!("actor-{n}"))
        }
    }

    #[test]
    fn actor_is_consulted_on_every_prepare() {
        let archivist = Archivist::in_memory(
            Arc::new(StandardModifier::default()),
            Arc::new(RotatingActor::default()),
        )
        .with_clock(Arc::new(FixedClock(Timestamp(1))));
        let mut doc = document();
        let a = archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let b = archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert_eq!(a.metadata().sys_metadata.principal.as_str(), "actor-0");
        assert_eq!(b.metadata().sys_metadata.principal.as_str(), "actor-1");
    }

    // -----------------------------------------------------------------------
    // Register / save state machine
    // -----------------------------------------------------------------------

    #[test]
    fn register_creates_history() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let token = fixture.archivist.register(&mut prepared).unwrap();
        assert!(token.is_some());
        assert!(prepared.is_committed());
        assert!(fixture.store.is_registered(prepared.history_id()).unwrap());
    }

    #[test]
    fn register_twice_is_noop() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert!(fixture.archivist.register(&mut prepared).unwrap().is_some());
        assert!(fixture.archivist.register(&mut prepared).unwrap().is_none());

        let history = fixture.archivist.get_history(&doc, PreserveSpec::Nothing).unwrap();
        assert_eq!(history.len().unwrap(), 1);
    }

    #[test]
    fn register_on_registered_bundle_is_noop() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert!(fixture.archivist.register(&mut prepared).unwrap().is_none());
        assert!(!prepared.is_committed());
        assert_eq!(fixture.store.record_count().unwrap(), 1);
    }

    #[test]
    fn save_unregistered_without_autoregister_fails() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let err = fixture.archivist.save(&mut prepared, false).unwrap_err();
        assert!(matches!(err, ArchivistError::Save { ref object, .. } if object == "/site/doc"));
        assert!(!fixture.store.is_registered(prepared.history_id()).unwrap());
    }

    #[test]
    fn save_with_autoregister_registers_instead() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.save(&mut prepared, true).unwrap();

        let history = fixture.archivist.get_history(&doc, PreserveSpec::Nothing).unwrap();
        assert_eq!(history.len().unwrap(), 1);
        assert_eq!(
            history.get(Selector::Latest).unwrap().version_id(),
            Some(VersionId(0))
        );
    }

    #[test]
    fn save_appends_next_version() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);

        doc.set_attribute("title", json!("Second").into());
        doc.touch();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.save(&mut prepared, false).unwrap();

        let record = fixture
            .archivist
            .retrieve(&doc, Selector::from(1), PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(record.version_id(), Some(VersionId(1)));
        assert_eq!(
            record.object.object.attribute("title").and_then(Attribute::as_value),
            Some(&json!("Second"))
        );
    }

    #[test]
    fn committed_bundle_cannot_be_saved_again() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.save(&mut prepared, false).unwrap();
        let err = fixture.archivist.save(&mut prepared, false).unwrap_err();
        assert!(matches!(err, ArchivistError::Save { .. }));
        assert_eq!(fixture.store.record_count().unwrap(), 2);
    }

    #[test]
    fn stale_bundle_is_rejected_by_the_store() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let mut first = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let mut second = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.save(&mut first, false).unwrap();

        let err = fixture.archivist.save(&mut second, false).unwrap_err();
        assert!(matches!(err, ArchivistError::Save { ref reason, .. } if reason.contains("conflict")));
    }

    #[test]
    fn racing_registrations_surface_register_error() {
        let fixture = archivist();
        let mut doc = document();
        let mut first = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        let mut second = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.register(&mut first).unwrap();
        let err = fixture.archivist.register(&mut second).unwrap_err();
        assert!(matches!(err, ArchivistError::Register { .. }));
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    #[test]
    fn round_trip_returns_prepared_state() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.register(&mut prepared).unwrap();

        let record = fixture
            .archivist
            .retrieve(&doc, Selector::from(0), PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(record.version_id(), Some(VersionId(0)));
        assert_eq!(record.object.object, doc);
        assert!(record.refs_to_be_deleted.is_empty());
        assert!(record.preserved_data.is_empty());
    }

    #[test]
    fn retrieve_past_end_fails() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 2);
        for v in [2, 3, 100] {
            let err = fixture
                .archivist
                .retrieve(&doc, Selector::from(v), PreserveSpec::Nothing)
                .unwrap_err();
            assert!(matches!(err, ArchivistError::Retrieve { ref selector, .. } if *selector == Selector::from(v)));
        }
    }

    #[test]
    fn retrieve_unregistered_fails() {
        let fixture = archivist();
        let err = fixture
            .archivist
            .retrieve(&document(), Selector::Latest, PreserveSpec::Nothing)
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Unregistered { .. }));
    }

    #[test]
    fn get_history_unregistered_fails_and_query_history_is_soft() {
        let fixture = archivist();
        let doc = document();
        let err = fixture
            .archivist
            .get_history(&doc, PreserveSpec::Nothing)
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Unregistered { .. }));

        let versions: Vec<VersionRecord> = fixture
            .archivist
            .query_history(&doc, PreserveSpec::Nothing)
            .unwrap()
            .map(|h| h.iter().collect::<ArchivistResult<Vec<_>>>())
            .transpose()
            .unwrap()
            .unwrap_or_default();
        assert!(versions.is_empty());
    }

    #[test]
    fn prepared_but_unsaved_object_is_still_unregistered() {
        let fixture = archivist();
        let mut doc = document();
        fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert!(fixture
            .archivist
            .query_history(&doc, PreserveSpec::Nothing)
            .unwrap()
            .is_none());
    }

    #[test]
    fn history_length_matches_commits() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 4);
        let history = fixture
            .archivist
            .query_history(&doc, PreserveSpec::Nothing)
            .unwrap()
            .unwrap();
        assert_eq!(history.len().unwrap(), 4);
        assert_eq!(history.iter().count(), 4);
    }

    #[test]
    fn object_type_introspection() {
        let fixture = archivist();
        let mut doc = document();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        fixture.archivist.register(&mut prepared).unwrap();
        assert_eq!(
            fixture.archivist.object_type(prepared.history_id()).unwrap(),
            "Document"
        );

        let unknown = HistoryId::from_raw([9; 32]);
        assert!(matches!(
            fixture.archivist.object_type(&unknown),
            Err(ArchivistError::Unregistered { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Up-to-date checks
    // -----------------------------------------------------------------------

    #[test]
    fn up_to_date_after_save_until_modified() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        assert!(fixture.archivist.is_up_to_date(&doc, Selector::Latest).unwrap());

        doc.touch();
        assert!(!fixture.archivist.is_up_to_date(&doc, Selector::Latest).unwrap());
    }

    #[test]
    fn older_marker_is_not_up_to_date() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);

        doc.set_modified(ModificationMarker::new(1, 0));
        assert!(!fixture.archivist.is_up_to_date(&doc, Selector::Latest).unwrap());
    }

    #[test]
    fn older_version_is_not_up_to_date() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 2);
        assert!(!fixture.archivist.is_up_to_date(&doc, Selector::from(0)).unwrap());
        assert!(fixture.archivist.is_up_to_date(&doc, Selector::from(1)).unwrap());
    }

    #[test]
    fn up_to_date_requires_registration() {
        let fixture = archivist();
        let err = fixture
            .archivist
            .is_up_to_date(&document(), Selector::Latest)
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Unregistered { .. }));
    }

    #[test]
    fn up_to_date_with_missing_version_is_retrieve_error() {
        let fixture = archivist();
        let mut doc = document();
        save_versions(&fixture.archivist, &mut doc, 1);
        let err = fixture
            .archivist
            .is_up_to_date(&doc, Selector::from(5))
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Retrieve { .. }));
    }

    // -----------------------------------------------------------------------
    // Clone protocol through the archivist
    // -----------------------------------------------------------------------

    fn image_doc() -> VersionedObject {
        document().with_child(
            "image",
            VersionedObject::new(key("/site/doc/image"), "Image")
                .with_value("pixels", json!([1, 2, 3])),
        )
    }

    fn image_modifier() -> StandardModifier {
        StandardModifier::new(
            ModifierConfig::default()
                .with_referenced("body")
                .with_volatile("lock")
                .with_reference_type("Image"),
        )
    }

    #[test]
    fn referenced_attributes_travel_out_of_band() {
        let fixture = archivist_with(image_modifier());
        let mut doc = image_doc();
        let mut prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        assert!(prepared.clone_data().object.attribute("body").is_none());
        assert!(prepared.referenced_data().contains(doc.key(), "body"));
        fixture.archivist.register(&mut prepared).unwrap();

        let record = fixture
            .archivist
            .retrieve(&doc, Selector::Latest, PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(
            record.object.object.attribute("body").and_then(Attribute::as_value),
            Some(&json!("Lorem ipsum"))
        );
    }

    #[test]
    fn volatile_attributes_are_not_archived() {
        let fixture = archivist_with(image_modifier());
        let mut doc = image_doc();
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();
        assert!(prepared.clone_data().object.attribute("lock").is_none());
        assert!(doc.attribute("lock").is_some());
    }

    #[test]
    fn contained_images_become_inside_references() {
        let fixture = archivist_with(image_modifier());
        let mut doc = image_doc();
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        let adapter = AttributeAdapter::new(doc.key().clone(), "image");
        assert_eq!(prepared.clone_data().inside_refs, vec![adapter.clone()]);
        assert_eq!(prepared.original().inside_refs, vec![adapter]);

        let reference = prepared
            .clone_data()
            .object
            .attribute("image")
            .and_then(Attribute::as_reference)
            .unwrap();
        assert_eq!(
            reference.history_id,
            fixture.registry.query_identity(&key("/site/doc/image")).unwrap()
        );
        assert!(doc.attribute("image").and_then(Attribute::as_child).is_some());
    }

    #[test]
    fn outside_references_are_pinned_to_stored_versions() {
        let fixture = archivist();
        store_versions(
            fixture.registry.as_ref(),
            fixture.store.as_ref(),
            &key("/site/other"),
            2,
        );
        let mut doc = document().with_reference(
            "related",
            VersionAwareReference::to(key("/site/other")).with_info(json!("see also")),
        );
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        let adapter = AttributeAdapter::new(doc.key().clone(), "related");
        assert_eq!(prepared.clone_data().outside_refs, vec![adapter.clone()]);
        let reference = adapter
            .get(&prepared.clone_data().object)
            .and_then(Attribute::as_reference)
            .unwrap();
        assert_eq!(reference.version_id, Some(VersionId(1)));
        assert_eq!(reference.location_id, Some(LocationId::DEFAULT));
        assert_eq!(reference.info, Some(json!("see also")));
    }

    #[test]
    fn references_to_contained_objects_are_inside() {
        let fixture = archivist();
        let mut doc = image_doc().with_reference(
            "related",
            VersionAwareReference::to(key("/site/doc/image")),
        );
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        let adapter = AttributeAdapter::new(doc.key().clone(), "related");
        assert_eq!(prepared.clone_data().inside_refs, vec![adapter.clone()]);
        assert!(prepared.clone_data().outside_refs.is_empty());
        assert_eq!(prepared.original().inside_refs, vec![adapter]);
        assert!(prepared.original().outside_refs.is_empty());
    }

    #[test]
    fn original_refs_survive_hook_rewrites_of_the_clone() {
        let fixture = archivist_with(StandardModifier::new(
            ModifierConfig::default().with_volatile("related"),
        ));
        let mut doc = document().with_reference(
            "related",
            VersionAwareReference::to(key("/site/other")),
        );
        let prepared = fixture.archivist.prepare(&mut doc, None, no_meta()).unwrap();

        assert!(prepared.clone_data().object.attribute("related").is_none());
        assert!(prepared.clone_data().outside_refs.is_empty());
        assert_eq!(
            prepared.original().outside_refs,
            vec![AttributeAdapter::new(doc.key().clone(), "related")]
        );
        assert!(prepared.original().inside_refs.is_empty());
    }

    #[test]
    fn vanished_children_are_reported_for_deletion() {
        let fixture = archivist_with(image_modifier());
        let mut doc = image_doc();
        save_versions(&fixture.archivist, &mut doc, 1);

        doc.remove_attribute("image");
        let mut record = fixture
            .archivist
            .retrieve(&doc, Selector::Latest, PreserveSpec::Nothing)
            .unwrap();
        assert_eq!(
            record.refs_to_be_deleted,
            vec![AttributeAdapter::new(doc.key().clone(), "image")]
        );
        record.remove_deleted_refs().unwrap();
        assert!(record.object.object.attribute("image").is_none());
    }

    #[test]
    fn preserve_referenced_keeps_working_values() {
        let fixture = archivist_with(image_modifier());
        let mut doc = image_doc();
        save_versions(&fixture.archivist, &mut doc, 1);
        doc.set_attribute("body", json!("Edited").into());

        let record = fixture
            .archivist
            .retrieve(&doc, Selector::Latest, PreserveSpec::Referenced)
            .unwrap();
        assert_eq!(
            record.preserved_data.get("body").and_then(Attribute::as_value),
            Some(&json!("Edited"))
        );
    }

    #[test]
    fn clone_depth_is_bounded_by_config() {
        let fixture = archivist();
        let archivist = fixture
            .archivist
            .with_config(ArchivistConfig {
                max_clone_depth: 1,
                ..Default::default()
            })
            .unwrap();
        let mut doc = image_doc();
        let err = archivist.prepare(&mut doc, None, no_meta()).unwrap_err();
        assert!(matches!(err, ArchivistError::CloneDepthExceeded { limit: 1, .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = archivist()
            .archivist
            .with_config(ArchivistConfig {
                max_clone_depth: 0,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Config(_)));
    }

    #[test]
    fn resolve_reference_assigns_identity() {
        let fixture = archivist();
        let mut reference = VersionAwareReference::to(key("/site/other")).with_info(json!(1));
        fixture.archivist.resolve_reference(&mut reference, true).unwrap();
        assert!(reference.is_resolved());
        assert!(reference.info.is_none());
        assert!(reference.version_id.is_none());
    }

    struct RefusingModifier;

    impl Modifier for RefusingModifier {
        fn referenced_attributes(
            &self,
            _obj: &VersionedObject,
        ) -> Result<edn_types::ReferencedData, HookError> {
            Err(HookError::Rejected("checked out".into()))
        }

        fn before_save(
            &self,
            _obj: &VersionedObject,
            _clone: &mut VersionedObject,
        ) -> Result<DiscoveredRefs, HookError> {
            Ok(DiscoveredRefs::default())
        }

        fn after_retrieve(
            &self,
            _obj: &VersionedObject,
            _clone: &mut ObjectData,
            _preserve: &PreserveSpec,
        ) -> Result<RetrieveOutcome, HookError> {
            Ok(RetrieveOutcome::default())
        }
    }

    #[test]
    fn hook_failures_are_wrapped() {
        let archivist = Archivist::in_memory(
            Arc::new(RefusingModifier),
            Arc::new(StaticActor::new(PrincipalId::new("alice"))),
        );
        let mut doc = document();
        let err = archivist.prepare(&mut doc, None, no_meta()).unwrap_err();
        assert!(matches!(
            err,
            ArchivistError::Hook { ref object, source: HookError::Rejected(_) } if object == "/site/doc"
        ));
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", archivist().archivist);
        assert!(debug.contains("Archivist"));
        assert!(debug.contains("max_clone_depth"));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn versions_stay_contiguous(saves in 1usize..8) {
            let fixture = archivist();
            let mut doc = document();
            save_versions(&fixture.archivist, &mut doc, saves);

            let history = fixture.archivist.get_history(&doc, PreserveSpec::Nothing).unwrap();
            prop_assert_eq!(history.len().unwrap(), saves as u64);
            for (expected, record) in history.iter().enumerate() {
                prop_assert_eq!(record.unwrap().version_id(), Some(VersionId(expected as u64)));
            }
        }

        #[test]
        fn principal_cannot_be_overridden(claimed in "[a-z]{1,12}") {
            let fixture = archivist();
            let mut doc = document();
            let request = SysMetadataRequest {
                principal: Some(PrincipalId::new(claimed)),
                ..Default::default()
            };
            let prepared = fixture.archivist.prepare(&mut doc, None, request).unwrap();
            prop_assert_eq!(prepared.metadata().sys_metadata.principal.as_str(), "alice");
        }

        #[test]
        fn up_to_date_tracks_marker(physical in 1u64..1_000_000, logical in 0u32..100) {
            let fixture = archivist();
            let mut doc = document().with_modified(ModificationMarker::new(physical, logical));
            save_versions(&fixture.archivist, &mut doc, 1);
            prop_assert!(fixture.archivist.is_up_to_date(&doc, Selector::Latest).unwrap());
            doc.touch();
            prop_assert!(!fixture.archivist.is_up_to_date(&doc, Selector::Latest).unwrap());
        }
    }
}
