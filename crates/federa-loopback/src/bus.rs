//! In-process federation bus
//!
//! Holds every federation execution created through it, allocates handles,
//! tracks which federate owns which instance, and queues callbacks for each
//! member until that member pumps them.

use crate::model::ObjectModel;
use federa_core::{
    AttributeHandle, AttributeHandleSet, AttributeHandleValueMap, ClassHandle, FederateHandle,
    GatewayError, GatewayResult, InstanceHandle,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Updates kept per federation unless configured otherwise
pub const DEFAULT_UPDATE_LOG_CAPACITY: usize = 1024;

/// A callback waiting to be delivered to one member
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Discover {
        instance: InstanceHandle,
        class: ClassHandle,
    },
    Reflect {
        instance: InstanceHandle,
        values: AttributeHandleValueMap,
        tag: Vec<u8>,
    },
    Remove(InstanceHandle),
    ConnectionLost(String),
}

/// An attribute update as accepted by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Federate that sent the update
    pub federate: FederateHandle,
    /// Instance the values belong to
    pub instance: InstanceHandle,
    /// Encoded values by attribute handle
    pub values: AttributeHandleValueMap,
    /// User-supplied tag bytes
    pub tag: Vec<u8>,
}

#[derive(Debug)]
struct Member {
    name: String,
    federate_type: String,
    published: IndexMap<ClassHandle, AttributeHandleSet>,
    pending: VecDeque<Event>,
}

#[derive(Debug, Clone, Copy)]
struct InstanceRecord {
    class: ClassHandle,
    owner: FederateHandle,
}

#[derive(Debug)]
pub(crate) struct Federation {
    model_location: String,
    classes: IndexMap<String, ClassHandle>,
    attributes: IndexMap<ClassHandle, IndexMap<String, AttributeHandle>>,
    members: IndexMap<FederateHandle, Member>,
    instances: IndexMap<InstanceHandle, InstanceRecord>,
    updates: VecDeque<UpdateRecord>,
    update_log_capacity: usize,
    accepted_updates: u64,
    next_handle: u64,
}

impl Federation {
    fn new(model_location: &str, model: &ObjectModel, update_log_capacity: usize) -> Self {
        let mut federation = Self {
            model_location: model_location.to_string(),
            classes: IndexMap::new(),
            attributes: IndexMap::new(),
            members: IndexMap::new(),
            instances: IndexMap::new(),
            updates: VecDeque::new(),
            update_log_capacity,
            accepted_updates: 0,
            next_handle: 1,
        };
        for (class, attributes) in model.classes() {
            let class_handle = ClassHandle(federation.allocate());
            let handles = attributes
                .iter()
                .map(|name| (name.clone(), AttributeHandle(federation.allocate())))
                .collect();
            federation.classes.insert(class.to_string(), class_handle);
            federation.attributes.insert(class_handle, handles);
        }
        federation
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn member_mut(&mut self, federate: FederateHandle) -> GatewayResult<&mut Member> {
        self.members.get_mut(&federate).ok_or(GatewayError::NotJoined)
    }

    // Queue an event for every member except the sender
    fn broadcast(&mut self, sender: FederateHandle, event: &Event) {
        for (handle, member) in self.members.iter_mut() {
            if *handle != sender {
                member.pending.push_back(event.clone());
            }
        }
    }

    pub(crate) fn join(&mut self, name: &str, federate_type: &str) -> GatewayResult<FederateHandle> {
        if self.members.values().any(|member| member.name == name) {
            return Err(GatewayError::Rejected(format!("federate name {:?} already in use", name)));
        }

        let handle = FederateHandle(self.allocate());
        // Late joiners discover everything already registered
        let pending = self
            .instances
            .iter()
            .map(|(instance, record)| Event::Discover {
                instance: *instance,
                class: record.class,
            })
            .collect();
        self.members.insert(
            handle,
            Member {
                name: name.to_string(),
                federate_type: federate_type.to_string(),
                published: IndexMap::new(),
                pending,
            },
        );
        Ok(handle)
    }

    pub(crate) fn resign(&mut self, federate: FederateHandle) {
        if self.members.shift_remove(&federate).is_none() {
            return;
        }
        let owned: Vec<InstanceHandle> = self
            .instances
            .iter()
            .filter(|(_, record)| record.owner == federate)
            .map(|(instance, _)| *instance)
            .collect();
        for instance in owned {
            self.instances.shift_remove(&instance);
            self.broadcast(federate, &Event::Remove(instance));
        }
    }

    pub(crate) fn class_handle(&self, federate: FederateHandle, name: &str) -> GatewayResult<ClassHandle> {
        self.require_member(federate)?;
        self.classes
            .get(name)
            .copied()
            .ok_or_else(|| GatewayError::NotFound(format!("object class {:?}", name)))
    }

    pub(crate) fn attribute_handle(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        name: &str,
    ) -> GatewayResult<AttributeHandle> {
        self.require_member(federate)?;
        self.attributes
            .get(&class)
            .ok_or_else(|| GatewayError::NotFound(class.to_string()))?
            .get(name)
            .copied()
            .ok_or_else(|| GatewayError::NotFound(format!("attribute {:?} of {}", name, class)))
    }

    pub(crate) fn publish(
        &mut self,
        federate: FederateHandle,
        class: ClassHandle,
        attributes: &AttributeHandleSet,
    ) -> GatewayResult<()> {
        let declared = self
            .attributes
            .get(&class)
            .ok_or_else(|| GatewayError::NotFound(class.to_string()))?;
        if let Some(unknown) = attributes.iter().find(|a| !declared.values().any(|h| h == *a)) {
            return Err(GatewayError::NotFound(format!("{} is not an attribute of {}", unknown, class)));
        }

        self.member_mut(federate)?
            .published
            .entry(class)
            .or_default()
            .extend(attributes.iter().copied());
        Ok(())
    }

    pub(crate) fn register(&mut self, federate: FederateHandle, class: ClassHandle) -> GatewayResult<InstanceHandle> {
        let published = self
            .member_mut(federate)?
            .published
            .get(&class)
            .is_some_and(|attributes| !attributes.is_empty());
        if !published {
            return Err(GatewayError::NotPublished(class.to_string()));
        }

        let instance = InstanceHandle(self.allocate());
        self.instances.insert(instance, InstanceRecord { class, owner: federate });
        self.broadcast(federate, &Event::Discover { instance, class });
        Ok(instance)
    }

    pub(crate) fn update(
        &mut self,
        federate: FederateHandle,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        tag: &[u8],
    ) -> GatewayResult<()> {
        let record = *self
            .instances
            .get(&instance)
            .ok_or_else(|| GatewayError::NotFound(instance.to_string()))?;
        if record.owner != federate {
            return Err(GatewayError::Rejected(format!("{} is owned by {}", instance, record.owner)));
        }

        let member = self.member_mut(federate)?;
        let published = member.published.get(&record.class);
        if let Some(attribute) = values
            .keys()
            .find(|a| !published.is_some_and(|set| set.contains(*a)))
        {
            return Err(GatewayError::NotPublished(attribute.to_string()));
        }

        self.accepted_updates += 1;
        if self.update_log_capacity > 0 {
            if self.updates.len() == self.update_log_capacity {
                self.updates.pop_front();
            }
            self.updates.push_back(UpdateRecord {
                federate,
                instance,
                values: values.clone(),
                tag: tag.to_vec(),
            });
        }
        self.broadcast(
            federate,
            &Event::Reflect {
                instance,
                values: values.clone(),
                tag: tag.to_vec(),
            },
        );
        Ok(())
    }

    pub(crate) fn drain(&mut self, federate: FederateHandle) -> Vec<Event> {
        self.members
            .get_mut(&federate)
            .map(|member| member.pending.drain(..).collect())
            .unwrap_or_default()
    }

    fn require_member(&self, federate: FederateHandle) -> GatewayResult<()> {
        if self.members.contains_key(&federate) {
            Ok(())
        } else {
            Err(GatewayError::NotJoined)
        }
    }
}

#[derive(Debug)]
pub(crate) struct BusState {
    models: IndexMap<String, ObjectModel>,
    federations: IndexMap<String, Federation>,
    update_log_capacity: usize,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            models: IndexMap::new(),
            federations: IndexMap::new(),
            update_log_capacity: DEFAULT_UPDATE_LOG_CAPACITY,
        }
    }
}

impl BusState {
    pub(crate) fn create(&mut self, federation: &str, model_location: &str) -> GatewayResult<()> {
        if self.federations.contains_key(federation) {
            return Err(GatewayError::AlreadyExists(federation.to_string()));
        }
        let model = self
            .models
            .get(model_location)
            .ok_or_else(|| GatewayError::NotFound(format!("object model {:?}", model_location)))?;
        let federation_state = Federation::new(model_location, model, self.update_log_capacity);
        self.federations.insert(federation.to_string(), federation_state);
        debug!(federation, model = model_location, "federation execution created");
        Ok(())
    }

    pub(crate) fn federation(&self, name: &str) -> GatewayResult<&Federation> {
        self.federations
            .get(name)
            .ok_or_else(|| GatewayError::NotFound(format!("federation execution {:?}", name)))
    }

    pub(crate) fn federation_mut(&mut self, name: &str) -> GatewayResult<&mut Federation> {
        self.federations
            .get_mut(name)
            .ok_or_else(|| GatewayError::NotFound(format!("federation execution {:?}", name)))
    }
}

/// Shared in-process bus; clones refer to the same bus
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` recent updates per federation (0 disables the log)
    ///
    /// Applies to federation executions created afterwards.
    pub fn with_update_log_capacity(self, capacity: usize) -> Self {
        self.state.lock().update_log_capacity = capacity;
        self
    }

    /// Make an object model available under a document location
    pub fn install_model(&self, location: impl Into<String>, model: ObjectModel) {
        self.state.lock().models.insert(location.into(), model);
    }

    /// Check if an object model is installed at a location
    pub fn has_model(&self, location: &str) -> bool {
        self.state.lock().models.contains_key(location)
    }

    /// Names of existing federation executions
    pub fn federations(&self) -> Vec<String> {
        self.state.lock().federations.keys().cloned().collect()
    }

    /// Object model location a federation was created from
    pub fn model_location(&self, federation: &str) -> Option<String> {
        self.state
            .lock()
            .federation(federation)
            .ok()
            .map(|f| f.model_location.clone())
    }

    /// Names and federate types of the members of a federation
    pub fn members(&self, federation: &str) -> Vec<(String, String)> {
        self.state
            .lock()
            .federation(federation)
            .map(|f| {
                f.members
                    .values()
                    .map(|m| (m.name.clone(), m.federate_type.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live instances in a federation
    pub fn instance_count(&self, federation: &str) -> usize {
        self.state
            .lock()
            .federation(federation)
            .map(|f| f.instances.len())
            .unwrap_or(0)
    }

    /// Most recent updates accepted in a federation, oldest first
    pub fn updates(&self, federation: &str) -> Vec<UpdateRecord> {
        self.state
            .lock()
            .federation(federation)
            .map(|f| f.updates.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total updates accepted in a federation, including those dropped from the log
    pub fn update_count(&self, federation: &str) -> u64 {
        self.state
            .lock()
            .federation(federation)
            .map(|f| f.accepted_updates)
            .unwrap_or(0)
    }

    /// Remove a federation execution that has no members
    pub fn destroy_federation(&self, federation: &str) -> GatewayResult<()> {
        let mut state = self.state.lock();
        if !state.federation(federation)?.members.is_empty() {
            return Err(GatewayError::Rejected(format!("federation {:?} still has members", federation)));
        }
        state.federations.shift_remove(federation);
        Ok(())
    }

    /// Queue a connection-lost callback for every member of every federation
    pub fn sever(&self, reason: &str) {
        let mut state = self.state.lock();
        for federation in state.federations.values_mut() {
            for member in federation.members.values_mut() {
                member.pending.push_back(Event::ConnectionLost(reason.to_string()));
            }
        }
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        f(&mut self.state.lock())
    }
}
