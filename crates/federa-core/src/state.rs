//! Per-instance attribute state
//!
//! Holds both representations of an instance's attributes: the typed value
//! by name and the encoded bytes by handle. Every mutation re-encodes in the
//! same call, so the two never disagree.

use crate::class_def::EntityClassDefinition;
use crate::error::{Error, Result};
use crate::identity::{AttributeHandle, AttributeHandleValueMap};
use crate::value::AttributeValue;
use indexmap::IndexMap;
use std::sync::Arc;

/// Typed and encoded attribute values of one instance
#[derive(Debug, Clone)]
pub struct AttributeState {
    class: Arc<EntityClassDefinition>,
    values: IndexMap<String, Option<AttributeValue>>,
    encoded: AttributeHandleValueMap,
}

impl AttributeState {
    /// Create an empty state for a resolved class
    ///
    /// Every declared attribute starts unset with a zero-length encoding.
    pub fn new(class: Arc<EntityClassDefinition>) -> Result<Self> {
        let resolved = class
            .resolved()
            .ok_or_else(|| Error::ClassNotResolved(class.name().to_string()))?;

        let values = class
            .attribute_names()
            .map(|name| (name.to_string(), None))
            .collect();
        let encoded = resolved.iter().map(|(_, handle)| (handle, Vec::new())).collect();

        Ok(Self {
            class,
            values,
            encoded,
        })
    }

    /// Set an attribute and re-encode it
    ///
    /// On error nothing is modified.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        let value = value.into();
        let codec = self.class.codec(name).ok_or_else(|| self.unknown(name))?;
        let handle = self.handle(name)?;
        let bytes = codec.encode(&value).map_err(|source| Error::Codec {
            attribute: name.to_string(),
            source,
        })?;

        self.values.insert(name.to_string(), Some(value));
        self.encoded.insert(handle, bytes);
        Ok(())
    }

    /// Typed value of an attribute, if set
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// Encoded bytes of an attribute (empty if never set)
    pub fn encoded(&self, name: &str) -> Option<&[u8]> {
        let handle = self.class.attribute_handle(name)?;
        self.encoded_by_handle(handle)
    }

    /// Encoded bytes addressed by attribute handle
    pub fn encoded_by_handle(&self, handle: AttributeHandle) -> Option<&[u8]> {
        self.encoded.get(&handle).map(Vec::as_slice)
    }

    /// Typed values in declaration order; unset attributes are `None`
    pub fn values(&self) -> impl Iterator<Item = (&str, Option<&AttributeValue>)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Complete handle -> bytes map for every declared attribute
    pub fn snapshot_for_transmission(&self) -> AttributeHandleValueMap {
        self.encoded.clone()
    }

    /// The class these attributes belong to
    pub fn class(&self) -> &Arc<EntityClassDefinition> {
        &self.class
    }

    fn handle(&self, name: &str) -> Result<AttributeHandle> {
        self.class
            .attribute_handle(name)
            .ok_or_else(|| Error::ClassNotResolved(self.class.name().to_string()))
    }

    fn unknown(&self, name: &str) -> Error {
        Error::UnknownAttribute {
            class: self.class.name().to_string(),
            attribute: name.to_string(),
        }
    }
}
