//! `RuntimeGateway` over the loopback bus

use crate::bus::{Event, LoopbackBus};
use federa_core::{
    AttributeHandle, AttributeHandleSet, AttributeHandleValueMap, CallbackSink, ClassHandle,
    Connection, FederateHandle, GatewayError, GatewayResult, InstanceHandle, RuntimeGateway,
};
use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// How join attempts should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinFault {
    /// Joins behave normally
    #[default]
    None,
    /// The next `n` attempts fail
    Times(u32),
    /// Every attempt fails
    Always,
}

/// Failures to inject into a gateway
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `connect` reports the bus as unreachable
    pub unreachable: bool,
    /// Join attempt failures
    pub join: JoinFault,
    /// `register_instance` is rejected
    pub register: bool,
    /// Updates for these instances are rejected
    pub updates: IndexSet<InstanceHandle>,
}

/// Call counters for one gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub join_attempts: u64,
    pub registrations: u64,
    pub updates: u64,
    pub pumps: u64,
    pub delivered: u64,
}

/// One federate's view of a [`LoopbackBus`]
///
/// Callbacks queue on the bus until `pump_callbacks` delivers them; the
/// pump never sleeps, since delivery is synchronous.
pub struct LoopbackGateway {
    bus: LoopbackBus,
    sink: Option<Arc<dyn CallbackSink>>,
    membership: Option<(String, FederateHandle)>,
    faults: Faults,
    stats: GatewayStats,
}

impl LoopbackGateway {
    /// Create a gateway onto a bus
    pub fn new(bus: LoopbackBus) -> Self {
        Self {
            bus,
            sink: None,
            membership: None,
            faults: Faults::default(),
            stats: GatewayStats::default(),
        }
    }

    /// Report the bus as unreachable on connect
    pub fn unreachable(mut self) -> Self {
        self.faults.unreachable = true;
        self
    }

    /// Fail the next `n` join attempts
    pub fn failing_joins(mut self, n: u32) -> Self {
        self.faults.join = JoinFault::Times(n);
        self
    }

    /// Fail every join attempt
    pub fn never_joining(mut self) -> Self {
        self.faults.join = JoinFault::Always;
        self
    }

    /// Reject every instance registration
    pub fn failing_register(mut self) -> Self {
        self.faults.register = true;
        self
    }

    /// Reject updates for one instance from now on
    pub fn fail_updates_for(&mut self, instance: InstanceHandle) {
        self.faults.updates.insert(instance);
    }

    /// Stop rejecting updates for an instance
    pub fn heal_updates_for(&mut self, instance: InstanceHandle) {
        self.faults.updates.shift_remove(&instance);
    }

    /// Call counters so far
    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    /// The bus this gateway is attached to
    pub fn bus(&self) -> &LoopbackBus {
        &self.bus
    }

    /// Check if the gateway has connected
    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Federation and handle of the current membership
    pub fn membership(&self) -> Option<(&str, FederateHandle)> {
        self.membership.as_ref().map(|(name, handle)| (name.as_str(), *handle))
    }

    /// Leave the federation, removing every instance this federate registered
    pub fn resign(&mut self) {
        if let Some((federation, handle)) = self.membership.take() {
            self.bus.with_state(|state| {
                if let Ok(f) = state.federation_mut(&federation) {
                    f.resign(handle);
                }
            });
            debug!(%federation, %handle, "resigned federation execution");
        }
    }

    fn require_connected(&self) -> GatewayResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    fn require_joined(&self) -> GatewayResult<(String, FederateHandle)> {
        self.require_connected()?;
        self.membership.clone().ok_or(GatewayError::NotJoined)
    }

    fn take_join_fault(&mut self) -> bool {
        match self.faults.join {
            JoinFault::None => false,
            JoinFault::Always => true,
            JoinFault::Times(0) => {
                self.faults.join = JoinFault::None;
                false
            }
            JoinFault::Times(n) => {
                self.faults.join = if n == 1 { JoinFault::None } else { JoinFault::Times(n - 1) };
                true
            }
        }
    }
}

impl RuntimeGateway for LoopbackGateway {
    fn connect(&mut self, sink: Arc<dyn CallbackSink>) -> GatewayResult<Connection> {
        if self.faults.unreachable {
            return Err(GatewayError::Unreachable("loopback bus is offline".to_string()));
        }
        self.sink = Some(sink);
        Ok(Connection::new("loopback"))
    }

    fn create_federation_execution(
        &mut self,
        federation_name: &str,
        object_model_location: &str,
    ) -> GatewayResult<()> {
        self.require_connected()?;
        self.bus
            .with_state(|state| state.create(federation_name, object_model_location))
    }

    fn join_federation_execution(
        &mut self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> GatewayResult<FederateHandle> {
        self.require_connected()?;
        self.stats.join_attempts += 1;
        if self.membership.is_some() {
            return Err(GatewayError::Rejected("already joined".to_string()));
        }
        if self.take_join_fault() {
            return Err(GatewayError::Rejected("join refused".to_string()));
        }

        let handle = self.bus.with_state(|state| {
            state
                .federation_mut(federation_name)?
                .join(federate_name, federate_type)
        })?;
        self.membership = Some((federation_name.to_string(), handle));
        Ok(handle)
    }

    fn resolve_class_handle(&mut self, class_name: &str) -> GatewayResult<ClassHandle> {
        let (federation, me) = self.require_joined()?;
        self.bus
            .with_state(|state| state.federation(&federation)?.class_handle(me, class_name))
    }

    fn resolve_attribute_handle(
        &mut self,
        class: ClassHandle,
        attribute_name: &str,
    ) -> GatewayResult<AttributeHandle> {
        let (federation, me) = self.require_joined()?;
        self.bus.with_state(|state| {
            state
                .federation(&federation)?
                .attribute_handle(me, class, attribute_name)
        })
    }

    fn publish_attributes(
        &mut self,
        class: ClassHandle,
        attributes: &AttributeHandleSet,
    ) -> GatewayResult<()> {
        let (federation, me) = self.require_joined()?;
        self.bus
            .with_state(|state| state.federation_mut(&federation)?.publish(me, class, attributes))
    }

    fn register_instance(&mut self, class: ClassHandle) -> GatewayResult<InstanceHandle> {
        let (federation, me) = self.require_joined()?;
        self.stats.registrations += 1;
        if self.faults.register {
            return Err(GatewayError::Rejected("registration refused".to_string()));
        }
        self.bus
            .with_state(|state| state.federation_mut(&federation)?.register(me, class))
    }

    fn update_attribute_values(
        &mut self,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        tag: &[u8],
    ) -> GatewayResult<()> {
        let (federation, me) = self.require_joined()?;
        self.stats.updates += 1;
        if self.faults.updates.contains(&instance) {
            return Err(GatewayError::Rejected(format!("update for {} refused", instance)));
        }
        self.bus.with_state(|state| {
            state
                .federation_mut(&federation)?
                .update(me, instance, values, tag)
        })
    }

    fn pump_callbacks(&mut self, _min_wait: Duration, _max_wait: Duration) {
        self.stats.pumps += 1;
        let (Some(sink), Some((federation, me))) = (&self.sink, &self.membership) else {
            return;
        };

        // Drain under the lock, deliver after releasing it
        let events = self.bus.with_state(|state| {
            state
                .federation_mut(federation)
                .map(|f| f.drain(*me))
                .unwrap_or_default()
        });

        for event in &events {
            match event {
                Event::Discover { instance, class } => sink.discover_object_instance(*instance, *class),
                Event::Reflect { instance, values, tag } => {
                    sink.reflect_attribute_values(*instance, values, tag)
                }
                Event::Remove(instance) => sink.remove_object_instance(*instance),
                Event::ConnectionLost(reason) => sink.connection_lost(reason),
            }
        }
        if !events.is_empty() {
            trace!(federate = %me, delivered = events.len(), "delivered callbacks");
        }
        self.stats.delivered += events.len() as u64;
    }
}

impl Drop for LoopbackGateway {
    fn drop(&mut self) {
        self.resign();
    }
}

impl fmt::Debug for LoopbackGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackGateway")
            .field("connected", &self.is_connected())
            .field("membership", &self.membership)
            .field("faults", &self.faults)
            .field("stats", &self.stats)
            .finish()
    }
}
