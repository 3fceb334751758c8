use tracing::debug;

use edn_types::{
    Attribute, AttributeAdapter, ReferencedData, VersionAwareReference, VersionedObject,
};

use crate::error::{ArchivistError, ArchivistResult};
use crate::hooks::{CloneDecision, CloneStrategy, DiscoveredRefs};
use crate::reference::ReferenceResolver;

/// Everything the clone walk consults.
pub(crate) struct CloneContext<'a> {
    pub referenced: &'a ReferencedData,
    pub strategy: &'a dyn CloneStrategy,
    pub resolver: &'a ReferenceResolver<'a>,
    pub max_depth: usize,
}

/// A finished clone plus the references found on the original while walking
/// it.
#[derive(Debug)]
pub(crate) struct ClonedGraph {
    pub object: VersionedObject,
    /// Children stored by reference count as inside. Existing references are
    /// inside when their target is contained in the original.
    pub original_refs: DiscoveredRefs,
}

/// Produce a storage-safe copy of `obj`.
///
/// Referenced attributes are left out, values are deep-copied, existing
/// references are re-pinned, and contained children are either copied or
/// replaced by a reference depending on the strategy. The result owns all of
/// its state.
pub(crate) fn clone_object(
    obj: &VersionedObject,
    ctx: &CloneContext<'_>,
) -> ArchivistResult<ClonedGraph> {
    let mut original_refs = DiscoveredRefs::default();
    let object = clone_at_depth(obj, obj, ctx, 1, &mut original_refs)?;
    Ok(ClonedGraph {
        object,
        original_refs,
    })
}

fn clone_at_depth(
    root: &VersionedObject,
    obj: &VersionedObject,
    ctx: &CloneContext<'_>,
    depth: usize,
    found: &mut DiscoveredRefs,
) -> ArchivistResult<VersionedObject> {
    if depth > ctx.max_depth {
        return Err(ArchivistError::CloneDepthExceeded {
            object: obj.key().to_string(),
            limit: ctx.max_depth,
        });
    }

    let mut clone = VersionedObject::new(obj.key().clone(), obj.object_type())
        .with_modified(obj.modified());
    if let Some(version) = obj.version_id() {
        clone.set_version_id(version);
    }
    if let Some(location) = obj.location_id() {
        clone.set_location_id(location);
    }

    for (name, attr) in obj.attributes() {
        if ctx.referenced.contains(obj.key(), name) {
            continue;
        }
        let copied = match attr {
            Attribute::Value(value) => Attribute::Value(value.clone()),
            Attribute::Reference(reference) => {
                let adapter = AttributeAdapter::new(obj.key().clone(), name.clone());
                if root.find(&reference.target).is_some() {
                    found.inside.push(adapter);
                } else {
                    found.outside.push(adapter);
                }
                let mut reference = reference.clone();
                ctx.resolver.resolve(&mut reference, None, false)?;
                Attribute::Reference(reference)
            }
            Attribute::Child(child) => match ctx.strategy.classify(obj, name, child) {
                CloneDecision::Copy => {
                    let copy = clone_at_depth(root, child, ctx, depth + 1, found)?;
                    Attribute::Child(Box::new(copy))
                }
                CloneDecision::Reference => {
                    let mut reference = VersionAwareReference::to(child.key().clone());
                    ctx.resolver
                        .resolve(&mut reference, child.version_id(), true)?;
                    found
                        .inside
                        .push(AttributeAdapter::new(obj.key().clone(), name.clone()));
                    debug!(owner = %obj.key(), attribute = %name, target = %child.key(), "child stored by reference");
                    Attribute::Reference(reference)
                }
            },
        };
        clone.set_attribute(name.clone(), copied);
    }
    Ok(clone)
}
