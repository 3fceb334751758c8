//! Attribute hooks: the pluggable half of the clone protocol.
//!
//! A [`Modifier`] decides which attributes travel by reference, may rewrite a
//! fresh clone before it is stored, and post-processes every reconstructed
//! version on the way out. A [`CloneStrategy`] decides, per contained child,
//! whether the child is deep-copied into the parent's clone or replaced by a
//! version-aware reference to its own history.

use std::collections::BTreeMap;

use edn_types::{
    Attribute, AttributeAdapter, ObjectData, PreserveSpec, ReferencedData, VersionedObject,
};

use crate::config::ModifierConfig;
use crate::error::HookError;

/// What the clone protocol does with one contained child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloneDecision {
    /// Deep-copy the child into the clone.
    Copy,
    /// Store a version-aware reference to the child instead.
    Reference,
}

pub trait CloneStrategy: Send + Sync {
    fn classify(
        &self,
        owner: &VersionedObject,
        attribute: &str,
        child: &VersionedObject,
    ) -> CloneDecision;
}

/// Copies every contained child.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeepCopy;

impl CloneStrategy for DeepCopy {
    fn classify(&self, _: &VersionedObject, _: &str, _: &VersionedObject) -> CloneDecision {
        CloneDecision::Copy
    }
}

/// References discovered on a clone, split by archive scope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscoveredRefs {
    /// References to objects contained in the working object.
    pub inside: Vec<AttributeAdapter>,
    /// References leaving the working object.
    pub outside: Vec<AttributeAdapter>,
}

/// Post-retrieve report for one reconstructed version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrieveOutcome {
    /// Reference attributes the caller should drop from the reconstruction.
    pub refs_to_be_deleted: Vec<AttributeAdapter>,
    /// Current working values to keep instead of the historical ones.
    pub preserved_data: BTreeMap<String, Attribute>,
}

pub trait Modifier: Send + Sync {
    /// Extract the attributes of `obj` that must be stored by reference.
    fn referenced_attributes(&self, obj: &VersionedObject) -> Result<ReferencedData, HookError>;

    /// Strategy for contained children. `None` means [`DeepCopy`].
    fn clone_strategy(&self, _obj: &VersionedObject) -> Option<&dyn CloneStrategy> {
        None
    }

    /// Runs on a fresh clone before it is stored.
    fn before_save(
        &self,
        obj: &VersionedObject,
        clone: &mut VersionedObject,
    ) -> Result<DiscoveredRefs, HookError>;

    /// Runs on every reconstructed version after reattachment.
    fn after_retrieve(
        &self,
        obj: &VersionedObject,
        clone: &mut ObjectData,
        preserve: &PreserveSpec,
    ) -> Result<RetrieveOutcome, HookError>;

    /// Put referenced attributes back onto a reconstructed clone.
    ///
    /// Entries whose owner is not part of `clone` are skipped.
    fn reattach(
        &self,
        clone: &mut VersionedObject,
        referenced: &ReferencedData,
    ) -> Result<(), HookError> {
        for entry in referenced.iter() {
            if clone.find(&entry.adapter.owner).is_some() {
                entry.adapter.set(clone, entry.value.clone())?;
            }
        }
        Ok(())
    }
}

/// Configuration-driven [`Modifier`].
///
/// With an empty [`ModifierConfig`] it stores everything by value and
/// preserves only what the caller names explicitly.
#[derive(Clone, Debug, Default)]
pub struct StandardModifier {
    config: ModifierConfig,
}

impl StandardModifier {
    pub fn new(config: ModifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModifierConfig {
        &self.config
    }

    fn collect_referenced(&self, obj: &VersionedObject, data: &mut ReferencedData) {
        for (name, attr) in obj.attributes() {
            if self.config.referenced_attributes.contains(name) {
                data.push(AttributeAdapter::new(obj.key().clone(), name.clone()), attr.clone());
            } else if let Attribute::Child(child) = attr {
                self.collect_referenced(child, data);
            }
        }
    }

    fn strip_volatile(&self, obj: &mut VersionedObject) {
        for name in &self.config.volatile_attributes {
            obj.remove_attribute(name);
        }
        let names: Vec<String> = obj.attribute_names().map(str::to_string).collect();
        for name in names {
            if let Some(Attribute::Child(child)) = obj.attribute_mut(&name) {
                self.strip_volatile(child);
            }
        }
    }
}

impl CloneStrategy for StandardModifier {
    fn classify(&self, _: &VersionedObject, _: &str, child: &VersionedObject) -> CloneDecision {
        if self.config.reference_types.contains(child.object_type()) {
            CloneDecision::Reference
        } else {
            CloneDecision::Copy
        }
    }
}

impl Modifier for StandardModifier {
    fn referenced_attributes(&self, obj: &VersionedObject) -> Result<ReferencedData, HookError> {
        let mut data = ReferencedData::new();
        if !self.config.referenced_attributes.is_empty() {
            self.collect_referenced(obj, &mut data);
        }
        Ok(data)
    }

    fn clone_strategy(&self, _obj: &VersionedObject) -> Option<&dyn CloneStrategy> {
        if self.config.reference_types.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn before_save(
        &self,
        obj: &VersionedObject,
        clone: &mut VersionedObject,
    ) -> Result<DiscoveredRefs, HookError> {
        self.strip_volatile(clone);

        let mut refs = DiscoveredRefs::default();
        for (adapter, reference) in clone.references() {
            // Replaced children and references to contained objects both
            // point back into the archived graph.
            let replaced_child = matches!(adapter.get(obj), Some(Attribute::Child(_)));
            if replaced_child || obj.find(&reference.target).is_some() {
                refs.inside.push(adapter);
            } else {
                refs.outside.push(adapter);
            }
        }
        Ok(refs)
    }

    fn after_retrieve(
        &self,
        obj: &VersionedObject,
        clone: &mut ObjectData,
        preserve: &PreserveSpec,
    ) -> Result<RetrieveOutcome, HookError> {
        let refs_to_be_deleted = clone
            .inside_refs
            .iter()
            .filter(|adapter| match adapter.get(&clone.object) {
                Some(Attribute::Reference(r)) => obj.find(&r.target).is_none(),
                _ => false,
            })
            .cloned()
            .collect();

        let preserved_data = match preserve {
            PreserveSpec::Nothing => BTreeMap::new(),
            PreserveSpec::Attributes(names) => names
                .iter()
                .filter_map(|name| obj.attribute(name).map(|a| (name.clone(), a.clone())))
                .collect(),
            PreserveSpec::Referenced => obj
                .attributes()
                .iter()
                .filter(|(name, _)| self.config.referenced_attributes.contains(*name))
                .map(|(name, a)| (name.clone(), a.clone()))
                .collect(),
        };

        Ok(RetrieveOutcome {
            refs_to_be_deleted,
            preserved_data,
        })
    }
}
