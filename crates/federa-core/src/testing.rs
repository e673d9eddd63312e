//! Scripted gateway for unit tests

use crate::class_def::EntityClassDefinition;
use crate::gateway::{CallbackSink, Connection, GatewayError, GatewayResult, RuntimeGateway};
use crate::identity::{
    AttributeHandle, AttributeHandleSet, AttributeHandleValueMap, ClassHandle, FederateHandle,
    InstanceHandle,
};
use crate::registry::ClassRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Connect,
    Create(String, String),
    Join(String, String, String),
    ResolveClass(String),
    ResolveAttribute(ClassHandle, String),
    Publish(ClassHandle, AttributeHandleSet),
    Register(ClassHandle),
    Update(InstanceHandle, AttributeHandleValueMap, Vec<u8>),
    Pump,
}

/// Gateway that allocates handles on demand and fails where told to
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    calls: Vec<Call>,
    next_handle: u64,
    classes: HashMap<String, ClassHandle>,
    attributes: HashMap<(ClassHandle, String), AttributeHandle>,
    unreachable: bool,
    create_error: Option<GatewayError>,
    join_failures: u32,
    missing_classes: HashSet<String>,
    missing_attributes: HashSet<String>,
    publish_failures: HashSet<ClassHandle>,
    publish_failing_class: Option<String>,
    register_error: bool,
    update_failures: HashSet<InstanceHandle>,
    sink: Option<Arc<dyn CallbackSink>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub(crate) fn failing_create(mut self, error: GatewayError) -> Self {
        self.create_error = Some(error);
        self
    }

    /// Fail the first `n` join attempts
    pub(crate) fn failing_joins(mut self, n: u32) -> Self {
        self.join_failures = n;
        self
    }

    pub(crate) fn without_class(mut self, name: &str) -> Self {
        self.missing_classes.insert(name.to_string());
        self
    }

    pub(crate) fn without_attribute(mut self, name: &str) -> Self {
        self.missing_attributes.insert(name.to_string());
        self
    }

    pub(crate) fn failing_publish(mut self, class: &str) -> Self {
        self.publish_failing_class = Some(class.to_string());
        self
    }

    pub(crate) fn failing_register(mut self) -> Self {
        self.register_error = true;
        self
    }

    pub(crate) fn fail_updates_for(&mut self, instance: InstanceHandle) {
        self.update_failures.insert(instance);
    }

    pub(crate) fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub(crate) fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub(crate) fn join_attempts(&self) -> usize {
        self.count(|call| matches!(call, Call::Join(..)))
    }

    pub(crate) fn updates(&self) -> Vec<(InstanceHandle, AttributeHandleValueMap, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Update(instance, values, tag) => Some((*instance, values.clone(), tag.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RuntimeGateway for ScriptedGateway {
    fn connect(&mut self, sink: Arc<dyn CallbackSink>) -> GatewayResult<Connection> {
        self.calls.push(Call::Connect);
        if self.unreachable {
            return Err(GatewayError::Unreachable("scripted".to_string()));
        }
        self.sink = Some(sink);
        Ok(Connection::new("scripted"))
    }

    fn create_federation_execution(&mut self, federation: &str, fom: &str) -> GatewayResult<()> {
        self.calls.push(Call::Create(federation.to_string(), fom.to_string()));
        match self.create_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn join_federation_execution(
        &mut self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> GatewayResult<FederateHandle> {
        self.calls.push(Call::Join(
            federate_name.to_string(),
            federate_type.to_string(),
            federation_name.to_string(),
        ));
        if self.join_failures > 0 {
            self.join_failures -= 1;
            return Err(GatewayError::NotFound(federation_name.to_string()));
        }
        Ok(FederateHandle(self.allocate()))
    }

    fn resolve_class_handle(&mut self, class_name: &str) -> GatewayResult<ClassHandle> {
        self.calls.push(Call::ResolveClass(class_name.to_string()));
        if self.missing_classes.contains(class_name) {
            return Err(GatewayError::NotFound(class_name.to_string()));
        }
        if let Some(handle) = self.classes.get(class_name) {
            return Ok(*handle);
        }
        let handle = ClassHandle(self.allocate());
        self.classes.insert(class_name.to_string(), handle);
        if self.publish_failing_class.as_deref() == Some(class_name) {
            self.publish_failures.insert(handle);
        }
        Ok(handle)
    }

    fn resolve_attribute_handle(
        &mut self,
        class: ClassHandle,
        attribute_name: &str,
    ) -> GatewayResult<AttributeHandle> {
        self.calls.push(Call::ResolveAttribute(class, attribute_name.to_string()));
        if self.missing_attributes.contains(attribute_name) {
            return Err(GatewayError::NotFound(attribute_name.to_string()));
        }
        let key = (class, attribute_name.to_string());
        if let Some(handle) = self.attributes.get(&key) {
            return Ok(*handle);
        }
        let handle = AttributeHandle(self.allocate());
        self.attributes.insert(key, handle);
        Ok(handle)
    }

    fn publish_attributes(
        &mut self,
        class: ClassHandle,
        attributes: &AttributeHandleSet,
    ) -> GatewayResult<()> {
        self.calls.push(Call::Publish(class, attributes.clone()));
        if self.publish_failures.contains(&class) {
            return Err(GatewayError::Rejected("publish refused".to_string()));
        }
        Ok(())
    }

    fn register_instance(&mut self, class: ClassHandle) -> GatewayResult<InstanceHandle> {
        self.calls.push(Call::Register(class));
        if self.register_error {
            return Err(GatewayError::Rejected("registration refused".to_string()));
        }
        Ok(InstanceHandle(self.allocate()))
    }

    fn update_attribute_values(
        &mut self,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        tag: &[u8],
    ) -> GatewayResult<()> {
        self.calls.push(Call::Update(instance, values.clone(), tag.to_vec()));
        if self.update_failures.contains(&instance) {
            return Err(GatewayError::Rejected(format!("update refused for {}", instance)));
        }
        Ok(())
    }

    fn pump_callbacks(&mut self, _min_wait: Duration, _max_wait: Duration) {
        self.calls.push(Call::Pump);
    }
}

/// Resolve a definition against a throwaway gateway
pub(crate) fn resolved_class(definition: EntityClassDefinition) -> Arc<EntityClassDefinition> {
    let name = definition.name().to_string();
    let mut registry = ClassRegistry::new();
    let definition = registry.register(definition).expect("fresh registry");
    registry
        .resolve(&name, &mut ScriptedGateway::new())
        .expect("scripted gateway resolves everything");
    definition
}
