//! Shared fixtures for unit tests.

use std::sync::Arc;

use serde_json::json;

use edn_registry::{IdentityRegistry, InMemoryIdentityRegistry};
use edn_store::{HistoryStore, InMemoryHistoryStore};
use edn_types::{
    Metadata, ModificationMarker, ObjectData, ObjectKey, PrincipalId, ReferencedData, SysMetadata,
    SysMetadataRequest, Timestamp, VersionId, VersionedObject,
};

use crate::archivist::Archivist;
use crate::capability::{FixedClock, StaticActor};
use crate::hooks::StandardModifier;

pub(crate) const CLOCK_SECS: u64 = 1_700_000_000;

pub(crate) struct Fixture {
    pub archivist: Archivist,
    pub registry: Arc<InMemoryIdentityRegistry>,
    pub store: Arc<InMemoryHistoryStore>,
}

pub(crate) fn key(name: &str) -> ObjectKey {
    ObjectKey::new(name).unwrap()
}

pub(crate) fn archivist() -> Fixture {
    archivist_with(StandardModifier::default())
}

pub(crate) fn archivist_with(modifier: StandardModifier) -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let registry = Arc::new(InMemoryIdentityRegistry::new());
    let store = Arc::new(InMemoryHistoryStore::new());
    let archivist = Archivist::new(
        registry.clone(),
        store.clone(),
        Arc::new(modifier),
        Arc::new(StaticActor::new(PrincipalId::new("alice"))),
    )
    .with_clock(Arc::new(FixedClock(Timestamp(CLOCK_SECS))));
    Fixture {
        archivist,
        registry,
        store,
    }
}

pub(crate) fn document() -> VersionedObject {
    VersionedObject::new(key("/site/doc"), "Document")
        .with_value("title", json!("Hello"))
        .with_value("body", json!("Lorem ipsum"))
        .with_value("lock", json!(true))
        .with_modified(ModificationMarker::new(1_000, 0))
}

/// Commit `count` versions of `doc`, touching it before each one.
pub(crate) fn save_versions(archivist: &Archivist, doc: &mut VersionedObject, count: usize) {
    for _ in 0..count {
        doc.touch();
        let mut prepared = archivist
            .prepare(doc, None, SysMetadataRequest::default())
            .unwrap();
        archivist.save(&mut prepared, true).unwrap();
    }
}

/// Write `count` bare versions for `key` straight into the store.
pub(crate) fn store_versions(
    registry: &dyn IdentityRegistry,
    store: &dyn HistoryStore,
    key: &ObjectKey,
    count: u64,
) {
    let history_id = registry.register(key).unwrap();
    let metadata = Metadata {
        sys_metadata: SysMetadata::stamp(
            SysMetadataRequest::default(),
            "",
            Timestamp(1),
            PrincipalId::new("loader"),
        ),
        app_metadata: None,
    };
    for version in 0..count {
        let mut object = VersionedObject::new(key.clone(), "Stub");
        object.set_version_id(VersionId(version));
        let data = ObjectData::new(object);
        if version == 0 {
            store
                .register(&history_id, &data, &ReferencedData::new(), &metadata)
                .unwrap();
        } else {
            store
                .save(&history_id, &data, &ReferencedData::new(), &metadata)
                .unwrap();
        }
    }
}
