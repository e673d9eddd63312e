//! Federa Script - RON loader for federate content
//!
//! Loads from RON files:
//! - Class catalogs: object class names, attribute names and their codecs
//! - Session configuration: federation, federate, object model and policies

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{load_config, Loader};
pub use schema::{AttributeDef, ClassDef};
