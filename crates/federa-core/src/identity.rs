//! Identity types for entities and bus-assigned handles

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an entity instance within this process
///
/// Ids are generated at construction and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Allocate the next process-wide entity ID
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

macro_rules! bus_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw handle value
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

bus_handle!(
    /// Membership handle assigned when a federate joins a federation
    FederateHandle,
    "federate"
);
bus_handle!(
    /// Opaque bus identifier for an object class
    ClassHandle,
    "class"
);
bus_handle!(
    /// Opaque bus identifier for one attribute of an object class
    AttributeHandle,
    "attribute"
);
bus_handle!(
    /// Opaque bus identifier for a registered object instance
    InstanceHandle,
    "instance"
);

/// Ordered set of attribute handles, as published for a class
pub type AttributeHandleSet = IndexSet<AttributeHandle>;

/// Encoded attribute values addressed by handle, as sent over the bus
pub type AttributeHandleValueMap = IndexMap<AttributeHandle, Vec<u8>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique() {
        let a = EntityId::next();
        let b = EntityId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", EntityId(42)), "entity:42");
        assert_eq!(format!("{}", ClassHandle(3)), "class#3");
        assert_eq!(format!("{}", InstanceHandle(7)), "instance#7");
    }
}
