use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::identity::{HistoryId, ObjectKey};
use crate::temporal::ModificationMarker;
use crate::version::{LocationId, VersionId};

/// One named attribute of a [`VersionedObject`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    /// Plain structured data, always copied by value.
    Value(Value),
    /// A contained sub-object owned by its parent.
    Child(Box<VersionedObject>),
    /// A pointer to another versioned object. Never followed when cloning.
    Reference(VersionAwareReference),
}

impl Attribute {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_child(&self) -> Option<&VersionedObject> {
        match self {
            Self::Child(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&VersionAwareReference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Key of the object this attribute points at, if it points at one.
    pub fn target_key(&self) -> Option<&ObjectKey> {
        match self {
            Self::Value(_) => None,
            Self::Child(c) => Some(c.key()),
            Self::Reference(r) => Some(&r.target),
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// A live, identity-bearing structured object under version control.
///
/// The object graph is a tree: children are owned through
/// [`Attribute::Child`], everything else is reached through
/// [`Attribute::Reference`]. Cloning a `VersionedObject` therefore never
/// aliases mutable state with the original.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedObject {
    key: ObjectKey,
    object_type: String,
    version_id: Option<VersionId>,
    location_id: Option<LocationId>,
    modified: ModificationMarker,
    attributes: BTreeMap<String, Attribute>,
}

impl VersionedObject {
    /// Create an unversioned object with no attributes.
    pub fn new(key: ObjectKey, object_type: impl Into<String>) -> Self {
        Self {
            key,
            object_type: object_type.into(),
            version_id: None,
            location_id: None,
            modified: ModificationMarker::zero(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), Attribute::Value(value));
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, child: VersionedObject) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Child(Box::new(child)));
        self
    }

    pub fn with_reference(
        mut self,
        name: impl Into<String>,
        reference: VersionAwareReference,
    ) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Reference(reference));
        self
    }

    pub fn with_modified(mut self, modified: ModificationMarker) -> Self {
        self.modified = modified;
        self
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn version_id(&self) -> Option<VersionId> {
        self.version_id
    }

    pub fn set_version_id(&mut self, version_id: VersionId) {
        self.version_id = Some(version_id);
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn set_location_id(&mut self, location_id: LocationId) {
        self.location_id = Some(location_id);
    }

    pub fn modified(&self) -> ModificationMarker {
        self.modified
    }

    pub fn set_modified(&mut self, modified: ModificationMarker) {
        self.modified = modified;
    }

    /// Record a modification by advancing the marker.
    pub fn touch(&mut self) {
        self.modified = self.modified.advance();
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        attribute: Attribute,
    ) -> Option<Attribute> {
        self.attributes.insert(name.into(), attribute)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, Attribute> {
        &mut self.attributes
    }

    /// Find an object by key within this graph (including `self`).
    pub fn find(&self, key: &ObjectKey) -> Option<&VersionedObject> {
        if &self.key == key {
            return Some(self);
        }
        self.attributes.values().find_map(|attr| match attr {
            Attribute::Child(child) => child.find(key),
            _ => None,
        })
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, key: &ObjectKey) -> Option<&mut VersionedObject> {
        if &self.key == key {
            return Some(self);
        }
        self.attributes.values_mut().find_map(|attr| match attr {
            Attribute::Child(child) => child.find_mut(key),
            _ => None,
        })
    }

    /// Depth of the contained-child tree (a leaf object has depth 1).
    pub fn depth(&self) -> usize {
        1 + self
            .attributes
            .values()
            .filter_map(Attribute::as_child)
            .map(VersionedObject::depth)
            .max()
            .unwrap_or(0)
    }

    /// Every reference attribute in the graph, located by adapter.
    pub fn references(&self) -> Vec<(AttributeAdapter, &VersionAwareReference)> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(
        &'a self,
        found: &mut Vec<(AttributeAdapter, &'a VersionAwareReference)>,
    ) {
        for (name, attr) in &self.attributes {
            match attr {
                Attribute::Reference(r) => {
                    found.push((AttributeAdapter::new(self.key.clone(), name.clone()), r))
                }
                Attribute::Child(child) => child.collect_references(found),
                Attribute::Value(_) => {}
            }
        }
    }
}

/// Reference to another versioned object, pinned to a history and version
/// where those are known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionAwareReference {
    pub target: ObjectKey,
    pub history_id: Option<HistoryId>,
    pub version_id: Option<VersionId>,
    pub location_id: Option<LocationId>,
    /// Free-form caller data, dropped once the reference is resolved.
    pub info: Option<Value>,
}

impl VersionAwareReference {
    /// An unresolved reference to `target`.
    pub fn to(target: ObjectKey) -> Self {
        Self {
            target,
            history_id: None,
            version_id: None,
            location_id: None,
            info: None,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.history_id.is_some()
    }
}

/// Owner handle plus attribute name, stored by value.
///
/// An adapter never holds a pointer to its owner. It is resolved only
/// against an object graph passed in explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeAdapter {
    pub owner: ObjectKey,
    pub name: String,
}

impl AttributeAdapter {
    pub fn new(owner: ObjectKey, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    pub fn get<'a>(&self, graph: &'a VersionedObject) -> Option<&'a Attribute> {
        graph.find(&self.owner)?.attribute(&self.name)
    }

    /// Set the attribute on its owner inside `graph`, returning the old value.
    pub fn set(
        &self,
        graph: &mut VersionedObject,
        value: Attribute,
    ) -> Result<Option<Attribute>, TypeError> {
        let owner = graph
            .find_mut(&self.owner)
            .ok_or_else(|| self.unknown_owner())?;
        Ok(owner.set_attribute(self.name.clone(), value))
    }

    /// Remove the attribute from its owner inside `graph`.
    pub fn take(&self, graph: &mut VersionedObject) -> Result<Option<Attribute>, TypeError> {
        let owner = graph
            .find_mut(&self.owner)
            .ok_or_else(|| self.unknown_owner())?;
        Ok(owner.attributes_mut().remove(&self.name))
    }

    fn unknown_owner(&self) -> TypeError {
        TypeError::UnknownOwner {
            owner: self.owner.to_string(),
            attribute: self.name.clone(),
        }
    }
}

/// An object together with the references discovered while cloning it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub object: VersionedObject,
    pub inside_refs: Vec<AttributeAdapter>,
    pub outside_refs: Vec<AttributeAdapter>,
}

impl ObjectData {
    pub fn new(object: VersionedObject) -> Self {
        Self {
            object,
            inside_refs: Vec::new(),
            outside_refs: Vec::new(),
        }
    }

    pub fn with_refs(
        object: VersionedObject,
        inside_refs: Vec<AttributeAdapter>,
        outside_refs: Vec<AttributeAdapter>,
    ) -> Self {
        Self {
            object,
            inside_refs,
            outside_refs,
        }
    }
}

/// One attribute persisted by reference instead of inside the clone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencedAttribute {
    pub adapter: AttributeAdapter,
    pub value: Attribute,
}

/// All attributes extracted from a working object before cloning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferencedData {
    entries: Vec<ReferencedAttribute>,
}

impl ReferencedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, adapter: AttributeAdapter, value: Attribute) {
        self.entries.push(ReferencedAttribute { adapter, value });
    }

    pub fn contains(&self, owner: &ObjectKey, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| &e.adapter.owner == owner && e.adapter.name == name)
    }

    pub fn get(&self, owner: &ObjectKey, name: &str) -> Option<&Attribute> {
        self.entries
            .iter()
            .find(|e| &e.adapter.owner == owner && e.adapter.name == name)
            .map(|e| &e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferencedAttribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
