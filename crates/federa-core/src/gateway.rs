//! Runtime gateway: the capability interface to the simulation bus
//!
//! The bus itself (handle allocation, federation membership, message
//! delivery) lives outside this crate. Bindings implement [`RuntimeGateway`]
//! for their chosen runtime; the session only ever talks to the bus through it.

use crate::identity::{
    AttributeHandle, AttributeHandleSet, AttributeHandleValueMap, ClassHandle, FederateHandle,
    InstanceHandle,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a gateway call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The bus could not be reached
    #[error("bus unreachable: {0}")]
    Unreachable(String),

    /// The call requires a connection that has not been made
    #[error("not connected to the bus")]
    NotConnected,

    /// The named federation execution already exists
    #[error("federation execution already exists: {0}")]
    AlreadyExists(String),

    /// A federation, class, attribute or instance name is unknown to the bus
    #[error("not found: {0}")]
    NotFound(String),

    /// The call requires federation membership
    #[error("not a member of a federation execution")]
    NotJoined,

    /// Attributes were updated without being published first
    #[error("attribute not published: {0}")]
    NotPublished(String),

    /// The bus refused the request
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// An established bus connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Human-readable description of the endpoint
    pub endpoint: String,
}

impl Connection {
    /// Create a connection descriptor
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

/// Receiver for callbacks delivered by the bus
///
/// Callbacks are only delivered while the session pumps them with
/// [`RuntimeGateway::pump_callbacks`]. Every method defaults to a no-op.
pub trait CallbackSink: Send + Sync {
    /// Another federate registered an instance of a class we can see
    fn discover_object_instance(&self, _instance: InstanceHandle, _class: ClassHandle) {}

    /// Another federate pushed attribute values
    fn reflect_attribute_values(
        &self,
        _instance: InstanceHandle,
        _values: &AttributeHandleValueMap,
        _tag: &[u8],
    ) {
    }

    /// An instance left the federation
    fn remove_object_instance(&self, _instance: InstanceHandle) {}

    /// The bus dropped our connection
    fn connection_lost(&self, _reason: &str) {}
}

/// Capability interface to the simulation bus
///
/// Calls are synchronous. A binding may block for as long as its runtime
/// takes to answer; the session does not interrupt in-flight calls.
pub trait RuntimeGateway: Send {
    /// Connect to the bus and register the callback sink
    fn connect(&mut self, sink: Arc<dyn CallbackSink>) -> GatewayResult<Connection>;

    /// Create the shared federation execution described by an object model document
    fn create_federation_execution(
        &mut self,
        federation_name: &str,
        object_model_location: &str,
    ) -> GatewayResult<()>;

    /// Join a federation execution under a federate-type tag
    fn join_federation_execution(
        &mut self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> GatewayResult<FederateHandle>;

    /// Look up the handle of an object class by name
    fn resolve_class_handle(&mut self, class_name: &str) -> GatewayResult<ClassHandle>;

    /// Look up the handle of one attribute of a class
    fn resolve_attribute_handle(
        &mut self,
        class: ClassHandle,
        attribute_name: &str,
    ) -> GatewayResult<AttributeHandle>;

    /// Declare intent to produce updates for a set of attributes
    fn publish_attributes(
        &mut self,
        class: ClassHandle,
        attributes: &AttributeHandleSet,
    ) -> GatewayResult<()>;

    /// Register a new object instance of a published class
    fn register_instance(&mut self, class: ClassHandle) -> GatewayResult<InstanceHandle>;

    /// Push encoded attribute values for a registered instance
    fn update_attribute_values(
        &mut self,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        tag: &[u8],
    ) -> GatewayResult<()>;

    /// Deliver pending callbacks to the sink
    ///
    /// Waits at least `min_wait` when callbacks are expected and never longer
    /// than `max_wait`. Must not block indefinitely.
    fn pump_callbacks(&mut self, min_wait: Duration, max_wait: Duration);
}

impl<G: RuntimeGateway + ?Sized> RuntimeGateway for Box<G> {
    fn connect(&mut self, sink: Arc<dyn CallbackSink>) -> GatewayResult<Connection> {
        (**self).connect(sink)
    }

    fn create_federation_execution(
        &mut self,
        federation_name: &str,
        object_model_location: &str,
    ) -> GatewayResult<()> {
        (**self).create_federation_execution(federation_name, object_model_location)
    }

    fn join_federation_execution(
        &mut self,
        federate_name: &str,
        federate_type: &str,
        federation_name: &str,
    ) -> GatewayResult<FederateHandle> {
        (**self).join_federation_execution(federate_name, federate_type, federation_name)
    }

    fn resolve_class_handle(&mut self, class_name: &str) -> GatewayResult<ClassHandle> {
        (**self).resolve_class_handle(class_name)
    }

    fn resolve_attribute_handle(
        &mut self,
        class: ClassHandle,
        attribute_name: &str,
    ) -> GatewayResult<AttributeHandle> {
        (**self).resolve_attribute_handle(class, attribute_name)
    }

    fn publish_attributes(
        &mut self,
        class: ClassHandle,
        attributes: &AttributeHandleSet,
    ) -> GatewayResult<()> {
        (**self).publish_attributes(class, attributes)
    }

    fn register_instance(&mut self, class: ClassHandle) -> GatewayResult<InstanceHandle> {
        (**self).register_instance(class)
    }

    fn update_attribute_values(
        &mut self,
        instance: InstanceHandle,
        values: &AttributeHandleValueMap,
        tag: &[u8],
    ) -> GatewayResult<()> {
        (**self).update_attribute_values(instance, values, tag)
    }

    fn pump_callbacks(&mut self, min_wait: Duration, max_wait: Duration) {
        (**self).pump_callbacks(min_wait, max_wait)
    }
}
