//! Class registry: the federate's class definitions and their bus handles

use crate::class_def::{EntityClassDefinition, ResolvedClass};
use crate::error::{Error, Result};
use crate::gateway::RuntimeGateway;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// All class definitions of one federate, keyed by class name
///
/// Definitions are shared with the instances created from them.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, Arc<EntityClassDefinition>>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class definition
    pub fn register(&mut self, definition: EntityClassDefinition) -> Result<Arc<EntityClassDefinition>> {
        let name = definition.name().to_string();
        if self.classes.contains_key(&name) {
            return Err(Error::DuplicateClass(name));
        }
        let definition = Arc::new(definition);
        self.classes.insert(name, Arc::clone(&definition));
        Ok(definition)
    }

    /// Look up a definition by class name
    pub fn get(&self, name: &str) -> Option<&Arc<EntityClassDefinition>> {
        self.classes.get(name)
    }

    /// Class names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// All definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityClassDefinition>> {
        self.classes.values()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Check that every registered class has its handles
    pub fn all_resolved(&self) -> bool {
        self.classes.values().all(|def| def.is_resolved())
    }

    /// Resolve a class's handles, or return the cached ones
    ///
    /// The class handle is looked up first, then each attribute in declaration
    /// order. A failure leaves the class unresolved and is not retried here.
    pub fn resolve<G>(&self, name: &str, gateway: &mut G) -> Result<&ResolvedClass>
    where
        G: RuntimeGateway + ?Sized,
    {
        let definition = self
            .classes
            .get(name)
            .ok_or_else(|| Error::UnknownClass(name.to_string()))?;

        if let Some(resolved) = definition.resolved() {
            debug!(class = name, "class handles cached");
            return Ok(resolved);
        }

        let class_handle =
            gateway
                .resolve_class_handle(name)
                .map_err(|source| Error::HandleResolution {
                    class: name.to_string(),
                    attribute: None,
                    source,
                })?;
        debug!(class = name, handle = %class_handle, "resolved class handle");

        let mut attributes = IndexMap::with_capacity(definition.attribute_count());
        for attribute in definition.attribute_names() {
            let handle = gateway
                .resolve_attribute_handle(class_handle, attribute)
                .map_err(|source| Error::HandleResolution {
                    class: name.to_string(),
                    attribute: Some(attribute.to_string()),
                    source,
                })?;
            debug!(class = name, attribute, handle = %handle, "resolved attribute handle");
            attributes.insert(attribute.to_string(), handle);
        }

        Ok(definition.install(ResolvedClass::new(class_handle, attributes)))
    }
}
