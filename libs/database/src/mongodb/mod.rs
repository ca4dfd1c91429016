//! MongoDB database connector and utilities
//!
//! Provides connection management and the mapping from driver SDAM events
//! to listener callbacks.

mod config;
mod connector;
pub mod events;

pub use config::MongoConfig;
pub use connector::{MongoError, connect_from_config, resolve_database};
pub use events::{DriverEvent, DriverEventListener, EventDispatcher, TopologyKind, node_name};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, Collection, Database};
