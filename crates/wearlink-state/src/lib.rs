//! Versioned snapshots of wearlink route graphs.
//!
//! A [`BoardSnapshot`] holds the structure of every route in a graph (source
//! descriptors, node kinds and child order) together with the environment
//! data of each node. Subscriber behavior is not data and must be
//! re-attached after [`deserialize`].
//!
//! The JSON layout is published as [`SNAPSHOT_SCHEMA`] for external tools.

pub mod config;
pub mod error;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StateError};
pub use schema::{schema_validation_enabled, validate_document, SNAPSHOT_SCHEMA};
pub use snapshot::{
    deserialize, restore_into, serialize, BoardSnapshot, NodeRecord, RouteRecord, CURRENT_VERSION,
};
pub use store::{load_from_path, read_snapshot, save_to_path};
