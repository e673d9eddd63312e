//! Entity class definitions
//!
//! A definition names one object class from the federation object model and
//! the codec for each of its attributes. Bus handles are attached once, when
//! the class is resolved by the [`ClassRegistry`](crate::ClassRegistry), and
//! never change afterwards.

use crate::codec::AttributeCodec;
use crate::identity::{AttributeHandle, AttributeHandleSet, ClassHandle};
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Bus handles for a resolved class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClass {
    class_handle: ClassHandle,
    attributes: IndexMap<String, AttributeHandle>,
}

impl ResolvedClass {
    pub(crate) fn new(class_handle: ClassHandle, attributes: IndexMap<String, AttributeHandle>) -> Self {
        Self {
            class_handle,
            attributes,
        }
    }

    /// Handle of the class itself
    pub fn class_handle(&self) -> ClassHandle {
        self.class_handle
    }

    /// Handle of one attribute
    pub fn attribute_handle(&self, name: &str) -> Option<AttributeHandle> {
        self.attributes.get(name).copied()
    }

    /// All attribute handles in declaration order
    pub fn handle_set(&self) -> AttributeHandleSet {
        self.attributes.values().copied().collect()
    }

    /// Attribute name and handle pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, AttributeHandle)> {
        self.attributes.iter().map(|(name, handle)| (name.as_str(), *handle))
    }
}

/// Definition of one simulable object class
#[derive(Debug)]
pub struct EntityClassDefinition {
    name: String,
    attributes: IndexMap<String, AttributeCodec>,
    resolved: OnceLock<ResolvedClass>,
}

impl EntityClassDefinition {
    /// Create a definition with no attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            resolved: OnceLock::new(),
        }
    }

    /// Declare an attribute (builder style)
    ///
    /// Declaring the same name twice keeps its first position and the last codec.
    pub fn with_attribute(mut self, name: impl Into<String>, codec: AttributeCodec) -> Self {
        self.attributes.insert(name.into(), codec);
        self
    }

    /// Class name as it appears in the object model
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute names in declaration order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Attribute name and codec pairs in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeCodec)> {
        self.attributes.iter().map(|(name, codec)| (name.as_str(), *codec))
    }

    /// Number of declared attributes
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Codec chosen for an attribute
    pub fn codec(&self, attribute: &str) -> Option<AttributeCodec> {
        self.attributes.get(attribute).copied()
    }

    /// Check if the attribute is declared
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Bus handles, once resolved
    pub fn resolved(&self) -> Option<&ResolvedClass> {
        self.resolved.get()
    }

    /// Check if handles have been resolved
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Class handle, once resolved
    pub fn class_handle(&self) -> Option<ClassHandle> {
        self.resolved().map(ResolvedClass::class_handle)
    }

    /// Attribute handle, once resolved
    pub fn attribute_handle(&self, attribute: &str) -> Option<AttributeHandle> {
        self.resolved().and_then(|r| r.attribute_handle(attribute))
    }

    /// Attach resolved handles; the first installation wins
    pub(crate) fn install(&self, resolved: ResolvedClass) -> &ResolvedClass {
        self.resolved.get_or_init(|| resolved)
    }
}
