//! Class catalog schema
//!
//! A catalog lists the object classes a federate publishes, by the names the
//! federation object model gives them, with a codec per attribute.

use federa_core::{AttributeCodec, EntityClassDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One object class and its attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class name as it appears in the object model
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Attributes in publication order
    pub attributes: Vec<AttributeDef>,
}

/// One attribute of a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name as it appears in the object model
    pub name: String,
    /// Codec used on the bus
    pub codec: AttributeCodec,
}

impl ClassDef {
    /// Create a class with no attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, codec: AttributeCodec) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            codec,
        });
        self
    }

    /// Reject empty names and duplicate attributes
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("class name must not be empty".to_string());
        }
        if self.attributes.is_empty() {
            return Err(format!("class {:?} declares no attributes", self.name));
        }
        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if attribute.name.trim().is_empty() {
                return Err(format!("class {:?} has an unnamed attribute", self.name));
            }
            if !seen.insert(attribute.name.as_str()) {
                return Err(format!(
                    "class {:?} declares attribute {:?} twice",
                    self.name, attribute.name
                ));
            }
        }
        Ok(())
    }

    /// Build the runtime definition
    pub fn to_definition(&self) -> EntityClassDefinition {
        self.attributes
            .iter()
            .fold(EntityClassDefinition::new(&self.name), |def, attribute| {
                def.with_attribute(&attribute.name, attribute.codec)
            })
    }
}
