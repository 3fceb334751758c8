use tracing::debug;

use edn_registry::IdentityRegistry;
use edn_store::HistoryStore;
use edn_types::{HistoryId, LocationId, VersionAwareReference, VersionId};

use crate::error::{ArchivistError, ArchivistResult};

/// Pins version-aware references to the histories of their targets.
pub(crate) struct ReferenceResolver<'a> {
    registry: &'a dyn IdentityRegistry,
    storage: &'a dyn HistoryStore,
}

impl<'a> ReferenceResolver<'a> {
    pub(crate) fn new(registry: &'a dyn IdentityRegistry, storage: &'a dyn HistoryStore) -> Self {
        Self { registry, storage }
    }

    /// Assign the target's history identity and, when it is known, its
    /// version.
    ///
    /// `target_version` is the working copy's own version number where the
    /// caller has the target at hand; otherwise the latest stored version is
    /// used. A target with neither keeps whatever version it already had.
    pub(crate) fn resolve(
        &self,
        reference: &mut VersionAwareReference,
        target_version: Option<VersionId>,
        remove_info: bool,
    ) -> ArchivistResult<()> {
        let target = reference.target.to_string();
        let history_id = self
            .registry
            .register(&reference.target)
            .map_err(|e| ArchivistError::from_registry(&target, e))?;
        reference.history_id = Some(history_id);

        let version = match target_version {
            Some(version) => Some(version),
            None => self.latest_stored(&target, &history_id)?,
        };
        if let Some(version) = version {
            reference.version_id = Some(version);
            reference.location_id = Some(LocationId::DEFAULT);
        }
        if remove_info {
            reference.info = None;
        }

        debug!(
            target = %reference.target,
            history_id = %history_id.short_id(),
            version = ?reference.version_id,
            "reference resolved"
        );
        Ok(())
    }

    fn latest_stored(
        &self,
        target: &str,
        history_id: &HistoryId,
    ) -> ArchivistResult<Option<VersionId>> {
        let registered = self
            .storage
            .is_registered(history_id)
            .map_err(|e| ArchivistError::from_store(target, e))?;
        if !registered {
            return Ok(None);
        }
        let len = self
            .storage
            .history(history_id)
            .and_then(|h| h.len())
            .map_err(|e| ArchivistError::from_store(target, e))?;
        Ok(len.checked_sub(1).map(VersionId))
    }
}
