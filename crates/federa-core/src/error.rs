//! Error types for federa-core
//!
//! Every variant names the failing operation's subject (class, attribute or
//! entity) so callers can report it without extra context.

use crate::codec::CodecError;
use crate::gateway::GatewayError;
use crate::identity::EntityId;
use crate::session::Phase;
use thiserror::Error;

/// Result type for federa-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The bus connection could not be established
    #[error("connection failed: {0}")]
    Connection(#[source] GatewayError),

    /// The federation execution could not be created
    #[error("could not create federation execution {federation:?}: {source}")]
    Creation {
        federation: String,
        #[source]
        source: GatewayError,
    },

    /// Every join attempt failed
    #[error("could not join federation {federation:?} after {attempts} attempts: {last}")]
    JoinTimeout {
        federation: String,
        attempts: u32,
        #[source]
        last: GatewayError,
    },

    /// The bus could not supply a class or attribute handle
    #[error("could not resolve {} for class {class:?}: {source}", Self::describe_attribute(.attribute))]
    HandleResolution {
        class: String,
        attribute: Option<String>,
        #[source]
        source: GatewayError,
    },

    /// Publishing a class's attribute set failed
    #[error("could not publish attributes of class {class:?}: {source}")]
    Publish {
        class: String,
        #[source]
        source: GatewayError,
    },

    /// A class failed to initialize; wraps the step that failed
    #[error("class {class:?} failed to initialize: {source}")]
    ClassInitialization {
        class: String,
        #[source]
        source: Box<Error>,
    },

    /// The bus refused to register an instance
    #[error("could not register {entity} of class {class:?}: {source}")]
    Registration {
        entity: EntityId,
        class: String,
        #[source]
        source: GatewayError,
    },

    /// Pushing attribute values failed
    #[error("could not push attributes of {entity} ({class}): {source}")]
    Transmission {
        entity: EntityId,
        class: String,
        #[source]
        source: GatewayError,
    },

    /// The operation is not valid in the session's current phase
    #[error("{operation} requires phase {expected}, session is {actual}")]
    InvalidPhase {
        operation: &'static str,
        expected: &'static str,
        actual: Phase,
    },

    /// Configuration or argument rejected before contacting the bus
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No class definition with this name
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// The class does not declare this attribute
    #[error("class {class:?} has no attribute {attribute:?}")]
    UnknownAttribute { class: String, attribute: String },

    /// The class definition has no bus handles yet
    #[error("class {0:?} has not been resolved against the bus")]
    ClassNotResolved(String),

    /// A class with this name is already registered
    #[error("duplicate class definition: {0}")]
    DuplicateClass(String),

    /// The entity has no instance handle yet
    #[error("{entity} ({class}) is not registered with the bus")]
    NotRegistered { entity: EntityId, class: String },

    /// A value could not be encoded for its attribute
    #[error("attribute {attribute:?}: {source}")]
    Codec {
        attribute: String,
        #[source]
        source: CodecError,
    },

    /// An entity's update rule failed
    #[error("update rule failed: {0}")]
    Update(String),
}

impl Error {
    /// Create an InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create an Update error from a rule's failure message
    pub fn update(msg: impl Into<String>) -> Self {
        Error::Update(msg.into())
    }

    /// Name of the class this error concerns, if any
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Error::HandleResolution { class, .. }
            | Error::Publish { class, .. }
            | Error::ClassInitialization { class, .. }
            | Error::Registration { class, .. }
            | Error::Transmission { class, .. }
            | Error::UnknownAttribute { class, .. }
            | Error::NotRegistered { class, .. } => Some(class),
            Error::UnknownClass(class)
            | Error::ClassNotResolved(class)
            | Error::DuplicateClass(class) => Some(class),
            _ => None,
        }
    }

    /// Entity this error concerns, if any
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Error::Registration { entity, .. }
            | Error::Transmission { entity, .. }
            | Error::NotRegistered { entity, .. } => Some(*entity),
            _ => None,
        }
    }

    fn describe_attribute(attribute: &Option<String>) -> String {
        match attribute {
            Some(name) => format!("attribute {:?}", name),
            None => "class handle".to_string(),
        }
    }
}

// Compile-time check that Error is Send + Sync for propagation across threads.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
