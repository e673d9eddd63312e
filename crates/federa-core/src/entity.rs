//! Entity instances and their update rules

use crate::class_def::EntityClassDefinition;
use crate::error::Result;
use crate::identity::{AttributeHandleValueMap, EntityId, InstanceHandle};
use crate::state::AttributeState;
use crate::value::AttributeValue;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Simulated behavior of an entity
///
/// `advance` moves the simulated state forward by one tick; `write` copies
/// the current simulated state into the attribute table.
pub trait UpdateRule: Send + Sync {
    /// Advance simulated state by one tick
    fn advance(&mut self) {}

    /// Write current simulated state into the attributes
    fn write(&self, attributes: &mut AttributeState) -> Result<()>;
}

impl<F> UpdateRule for F
where
    F: Fn(&mut AttributeState) -> Result<()> + Send + Sync,
{
    fn write(&self, attributes: &mut AttributeState) -> Result<()> {
        self(attributes)
    }
}

/// A rule that never changes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct Inert;

impl UpdateRule for Inert {
    fn write(&self, _attributes: &mut AttributeState) -> Result<()> {
        Ok(())
    }
}

/// One simulated object
pub struct EntityInstance {
    id: EntityId,
    instance_handle: Option<InstanceHandle>,
    attributes: AttributeState,
    rule: Box<dyn UpdateRule>,
}

impl EntityInstance {
    /// Create an unregistered instance of a resolved class
    pub fn new(class: Arc<EntityClassDefinition>, rule: impl UpdateRule + 'static) -> Result<Self> {
        Ok(Self {
            id: EntityId::next(),
            instance_handle: None,
            attributes: AttributeState::new(class)?,
            rule: Box::new(rule),
        })
    }

    /// Create an instance whose attributes are only changed by hand
    pub fn fixed(class: Arc<EntityClassDefinition>) -> Result<Self> {
        Self::new(class, Inert)
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Get the class definition
    pub fn class(&self) -> &Arc<EntityClassDefinition> {
        self.attributes.class()
    }

    /// Get the class name
    pub fn class_name(&self) -> &str {
        self.class().name()
    }

    /// Bus handle, once registered
    pub fn instance_handle(&self) -> Option<InstanceHandle> {
        self.instance_handle
    }

    /// Check if the instance has been registered with the bus
    pub fn is_registered(&self) -> bool {
        self.instance_handle.is_some()
    }

    /// Get the attribute state
    pub fn attributes(&self) -> &AttributeState {
        &self.attributes
    }

    /// Set one attribute and re-encode it
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        self.attributes.set(name, value)
    }

    /// Write the rule's current state into the attributes without advancing
    pub fn refresh_attributes(&mut self) -> Result<()> {
        self.rule.write(&mut self.attributes)
    }

    /// Advance one tick and refresh the attributes
    pub fn step(&mut self) -> Result<()> {
        self.rule.advance();
        self.refresh_attributes()
    }

    /// Complete handle -> bytes map for transmission
    pub fn snapshot_for_transmission(&self) -> AttributeHandleValueMap {
        self.attributes.snapshot_for_transmission()
    }

    pub(crate) fn assign_instance_handle(&mut self, handle: InstanceHandle) {
        debug_assert!(self.instance_handle.is_none(), "instance handle assigned twice");
        self.instance_handle = Some(handle);
    }
}

impl fmt::Debug for EntityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInstance")
            .field("id", &self.id)
            .field("class", &self.class_name())
            .field("instance_handle", &self.instance_handle)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// A lockable instance shared between the tick loop and readers
///
/// Mutation happens under the write lock, so a reader never sees a typed
/// value without its matching encoding.
#[derive(Clone)]
pub struct SharedEntity {
    id: EntityId,
    cell: Arc<RwLock<EntityInstance>>,
}

impl SharedEntity {
    /// Wrap an instance for sharing
    pub fn new(instance: EntityInstance) -> Self {
        Self {
            id: instance.id(),
            cell: Arc::new(RwLock::new(instance)),
        }
    }

    /// Get the entity ID without locking
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Lock for reading
    pub fn read(&self) -> RwLockReadGuard<'_, EntityInstance> {
        self.cell.read()
    }

    /// Lock for writing
    pub fn write(&self) -> RwLockWriteGuard<'_, EntityInstance> {
        self.cell.write()
    }

    /// Check if two handles refer to the same instance
    pub fn ptr_eq(&self, other: &SharedEntity) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl From<EntityInstance> for SharedEntity {
    fn from(instance: EntityInstance) -> Self {
        Self::new(instance)
    }
}

impl fmt::Debug for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedEntity").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AttributeCodec;
    use crate::testing::resolved_class;

    struct Walker {
        x: i64,
        vx: i64,
    }

    impl UpdateRule for Walker {
        fn advance(&mut self) {
            self.x += self.vx;
        }

        fn write(&self, attributes: &mut AttributeState) -> Result<()> {
            attributes.set("X", self.x)
        }
    }

    fn walker_class() -> Arc<EntityClassDefinition> {
        resolved_class(EntityClassDefinition::new("Walker").with_attribute("X", AttributeCodec::Integer))
    }

    #[test]
    fn test_new_instance_is_unregistered() {
        let entity = EntityInstance::new(walker_class(), Walker { x: 0, vx: 1 }).unwrap();
        assert!(!entity.is_registered());
        assert_eq!(entity.instance_handle(), None);
        assert_eq!(entity.class_name(), "Walker");
    }

    #[test]
    fn test_ids_differ_per_instance() {
        let class = walker_class();
        let a = EntityInstance::fixed(Arc::clone(&class)).unwrap();
        let b = EntityInstance::fixed(class).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_step_advances_then_writes() {
        let mut entity = EntityInstance::new(walker_class(), Walker { x: 10, vx: 3 }).unwrap();

        entity.refresh_attributes().unwrap();
        assert_eq!(entity.attributes().encoded("X"), Some(&b"10"[..]));

        entity.step().unwrap();
        entity.step().unwrap();
        assert_eq!(entity.attributes().get("X"), Some(&AttributeValue::Int(16)));
        assert_eq!(entity.attributes().encoded("X"), Some(&b"16"[..]));
    }

    #[test]
    fn test_closure_rule() {
        let rule = |attributes: &mut AttributeState| attributes.set("X", 7);
        let mut entity = EntityInstance::new(walker_class(), rule).unwrap();
        entity.step().unwrap();
        assert_eq!(entity.attributes().encoded("X"), Some(&b"7"[..]));
    }

    #[test]
    fn test_shared_entity_sees_writes() {
        let shared = SharedEntity::new(EntityInstance::fixed(walker_class()).unwrap());
        let reader = shared.clone();

        shared.write().set_attribute("X", 42).unwrap();
        assert_eq!(reader.read().attributes().encoded("X"), Some(&b"42"[..]));
        assert!(reader.ptr_eq(&shared));
        assert_eq!(reader.id(), shared.read().id());
    }
}
