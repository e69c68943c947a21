//! Inventory module for the rolewright system.
//!
//! This module provides persistent storage for per-machine identity
//! snapshots and per-role installation outcomes, keyed by
//! `(instance_id, record_type)`.

mod store;
mod types;
mod memory;
mod local;
mod dynamodb;

pub use store::{InventoryStore, find_server_by_name, first_named, list_servers, list_software};
pub use types::{
    Attributes, InstallationStatus, InventoryRecord, RecordKey, RecordKind, ScanFilter,
    ServerRecord, SoftwareRecord, SERVER_RECORD_TYPE, SOFTWARE_RECORD_PREFIX, TIMESTAMP_FORMAT,
    format_timestamp, parse_timestamp,
};
pub use memory::MemoryInventoryStore;
pub use local::{INVENTORY_DIR, LocalInventoryStore};
pub use dynamodb::DynamoInventoryStore;
