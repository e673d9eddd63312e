//! Federa Core - Federate lifecycle and attribute synchronization
//!
//! A federate is one process taking part in a shared-state simulation
//! federation. This crate provides:
//! - Attribute codecs (`AttributeCodec`) turning typed values into bus bytes
//! - Class definitions and the registry that resolves their bus handles
//! - Entity instances whose attribute state stays encoded on every change
//! - The `FederateSession` state machine: connect, create, join, initialize, tick
//! - The `RuntimeGateway` trait through which every bus call is made
//!
//! ## Data flow
//!
//! ```text
//! FederateSession ──▶ ClassRegistry ──resolve──▶ RuntimeGateway
//!        │                                            ▲
//!        ├── add_entity ──register_instance───────────┤
//!        └── tick ──▶ EntityInstance::step ──update───┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use federa_core::{AttributeCodec, EntityClassDefinition, FederateSession, SessionConfig};
//!
//! let config = SessionConfig::new("Main Sim Federation", "Main Sim Federate", "MainSim.xml");
//! let mut session = FederateSession::new(config, gateway)?;
//! session.add_class(
//!     EntityClassDefinition::new("BallEntity").with_attribute("Radius", AttributeCodec::Integer),
//! )?;
//! session.initialize()?;
//!
//! let ball = session.spawn("BallEntity", |attrs: &mut AttributeState| attrs.set("Radius", 5))?;
//! session.add_entity(&ball)?;
//! loop {
//!     session.tick()?;
//!     std::thread::sleep(session.config().tick_interval());
//! }
//! ```

mod callbacks;
mod class_def;
mod codec;
mod config;
mod entity;
mod error;
mod gateway;
mod identity;
mod registry;
mod session;
mod state;
mod tag;
mod value;
mod view;

#[cfg(test)]
mod testing;

pub use callbacks::SessionCallbacks;
pub use class_def::{EntityClassDefinition, ResolvedClass};
pub use codec::{AttributeCodec, CodecError};
pub use config::{
    Backoff, CallbackWait, JoinPolicy, SessionConfig, DEFAULT_FEDERATE_TYPE, DEFAULT_JOIN_ATTEMPTS,
};
pub use entity::{EntityInstance, Inert, SharedEntity, UpdateRule};
pub use error::{Error, Result};
pub use gateway::{CallbackSink, Connection, GatewayError, GatewayResult, RuntimeGateway};
pub use identity::{
    AttributeHandle, AttributeHandleSet, AttributeHandleValueMap, ClassHandle, EntityId,
    FederateHandle, InstanceHandle,
};
pub use registry::ClassRegistry;
pub use session::{FederateSession, Phase, Registration, TickFailure, TickReport};
pub use state::AttributeState;
pub use tag::UpdateTag;
pub use value::AttributeValue;
pub use view::{EntitySnapshot, SessionView};
