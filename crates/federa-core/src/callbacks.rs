//! Default callback sink installed by a session

use crate::gateway::CallbackSink;
use crate::identity::{AttributeHandleValueMap, ClassHandle, InstanceHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Records what the bus told this federate
///
/// Counters only grow. `connection_lost` keeps the most recent reason.
#[derive(Debug, Default)]
pub struct SessionCallbacks {
    discovered: AtomicU64,
    reflected: AtomicU64,
    removed: AtomicU64,
    lost: Mutex<Option<String>>,
}

impl SessionCallbacks {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances discovered
    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    /// Number of attribute reflections received
    pub fn reflected(&self) -> u64 {
        self.reflected.load(Ordering::Relaxed)
    }

    /// Number of instance removals received
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Reason the connection was lost, if it was
    pub fn connection_lost_reason(&self) -> Option<String> {
        self.lost.lock().clone()
    }
}

impl CallbackSink for SessionCallbacks {
    fn discover_object_instance(&self, instance: InstanceHandle, class: ClassHandle) {
        debug!(%instance, %class, "discovered object instance");
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    fn reflect_attribute_values(
        &self,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        _tag: &[u8],
    ) {
        debug!(%instance, attributes = values.len(), "reflected attribute values");
        self.reflected.fetch_add(1, Ordering::Relaxed);
    }

    fn remove_object_instance(&self, instance: InstanceHandle) {
        debug!(%instance, "removed object instance");
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_lost(&self, reason: &str) {
        warn!(reason, "connection to bus lost");
        *self.lost.lock() = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_callbacks() {
        let sink = SessionCallbacks::new();
        sink.discover_object_instance(InstanceHandle(1), ClassHandle(1));
        sink.reflect_attribute_values(InstanceHandle(1), &AttributeHandleValueMap::new(), b"tag");
        sink.reflect_attribute_values(InstanceHandle(1), &AttributeHandleValueMap::new(), b"tag");
        sink.connection_lost("bus shut down");

        assert_eq!(sink.discovered(), 1);
        assert_eq!(sink.reflected(), 2);
        assert_eq!(sink.removed(), 0);
        assert_eq!(sink.connection_lost_reason().as_deref(), Some("bus shut down"));
    }
}
