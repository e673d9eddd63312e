//! Object models known to the loopback bus

use federa_core::EntityClassDefinition;
use indexmap::{IndexMap, IndexSet};

/// Classes and attribute names a federation execution is created from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectModel {
    classes: IndexMap<String, IndexSet<String>>,
}

impl ObjectModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class with its attributes (builder style)
    pub fn with_class<I, S>(mut self, name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes
            .entry(name.into())
            .or_default()
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Build a model covering the given class definitions
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a EntityClassDefinition>) -> Self {
        definitions.into_iter().fold(Self::new(), |model, definition| {
            model.with_class(definition.name(), definition.attribute_names())
        })
    }

    /// Check if the model declares a class
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Check if a class declares an attribute
    pub fn has_attribute(&self, class: &str, attribute: &str) -> bool {
        self.classes
            .get(class)
            .is_some_and(|attributes| attributes.contains(attribute))
    }

    /// Iterate over classes and their attribute names
    pub fn classes(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.classes.iter().map(|(name, attributes)| (name.as_str(), attributes))
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the model declares no classes
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
