//! Read-only view of a session's live instances
//!
//! Observers (a UI thread, a monitor) hold a [`SessionView`] while the tick
//! loop owns the session. Each snapshot is taken under the instance's read
//! lock, so typed values and their encodings always agree.

use crate::entity::{EntityInstance, SharedEntity};
use crate::identity::{AttributeHandleValueMap, EntityId, InstanceHandle};
use crate::value::AttributeValue;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub(crate) type EntityTable = Arc<RwLock<IndexMap<EntityId, SharedEntity>>>;

/// Copy of one instance's state at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub class: String,
    pub instance_handle: Option<InstanceHandle>,
    pub values: IndexMap<String, Option<AttributeValue>>,
    pub encoded: AttributeHandleValueMap,
}

impl EntitySnapshot {
    /// Copy an instance's state
    pub fn capture(instance: &EntityInstance) -> Self {
        Self {
            id: instance.id(),
            class: instance.class_name().to_string(),
            instance_handle: instance.instance_handle(),
            values: instance
                .attributes()
                .values()
                .map(|(name, value)| (name.to_string(), value.copied()))
                .collect(),
            encoded: instance.snapshot_for_transmission(),
        }
    }
}

/// Clonable read-only handle over a session's registered instances
#[derive(Clone)]
pub struct SessionView {
    entities: EntityTable,
}

impl SessionView {
    pub(crate) fn new(entities: EntityTable) -> Self {
        Self { entities }
    }

    /// Snapshot every registered instance, in registration order
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.handles()
            .iter()
            .map(|entity| EntitySnapshot::capture(&entity.read()))
            .collect()
    }

    /// Snapshot one instance
    pub fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        let entity = self.entities.read().get(&id).cloned()?;
        let instance = entity.read();
        Some(EntitySnapshot::capture(&instance))
    }

    /// Snapshot every registered instance of a class
    pub fn by_class(&self, class: &str) -> Vec<EntitySnapshot> {
        self.snapshot()
            .into_iter()
            .filter(|snapshot| snapshot.class == class)
            .collect()
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Check if no instance is registered
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    // The table lock is released before any instance lock is taken.
    fn handles(&self) -> Vec<SharedEntity> {
        self.entities.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionView")
            .field("entities", &self.len())
            .finish()
    }
}
