//! Federa Loopback - in-process simulation bus
//!
//! Implements `RuntimeGateway` against a bus that lives in the same process,
//! so federates can be run and tested without an external runtime. Several
//! gateways can share one [`LoopbackBus`] and see each other's instances.
//!
//! ```
//! use federa_loopback::{LoopbackBus, LoopbackGateway, ObjectModel};
//!
//! let bus = LoopbackBus::new();
//! bus.install_model("MainSim.xml", ObjectModel::new().with_class("BallEntity", ["Radius"]));
//! let gateway = LoopbackGateway::new(bus.clone());
//! assert!(!gateway.is_connected());
//! ```
//!
//! Faults can be injected per gateway to exercise error paths:
//! unreachable bus, refused joins, refused registrations and refused updates.

mod bus;
mod gateway;
mod model;

pub use bus::{LoopbackBus, UpdateRecord, DEFAULT_UPDATE_LOG_CAPACITY};
pub use gateway::{Faults, GatewayStats, JoinFault, LoopbackGateway};
pub use model::ObjectModel;
