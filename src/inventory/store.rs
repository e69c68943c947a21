//! Inventory store trait definition.
//!
//! This module defines the common interface for inventory backends, plus the
//! read helpers every caller builds on top of a plain scan.

use async_trait::async_trait;

use crate::error::Result;
use super::types::{InventoryRecord, ScanFilter, ServerRecord, SoftwareRecord};

/// Trait for inventory storage backends.
///
/// Backends only need single-item writes and filtered scans. A put with an
/// existing `(instance_id, record_type)` key overwrites that row.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Writes a record, replacing any row with the same key.
    async fn put_item(&self, record: &InventoryRecord) -> Result<()>;

    /// Returns every record matching the filter, oldest row first.
    async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl InventoryStore for Box<dyn InventoryStore> {
    async fn put_item(&self, record: &InventoryRecord) -> Result<()> {
        (**self).put_item(record).await
    }

    async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>> {
        (**self).scan_items(filter).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Lists every `SERVER` record in scan order.
///
/// # Errors
///
/// Returns an error if the scan fails.
pub async fn list_servers(store: &dyn InventoryStore) -> Result<Vec<ServerRecord>> {
    let records = store.scan_items(&ScanFilter::servers()).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            InventoryRecord::Server(server) => Some(server),
            InventoryRecord::Software(_) => None,
        })
        .collect())
}

/// Finds a server by name with a linear scan.
///
/// When several snapshots share a name, the first-inserted one wins.
///
/// # Errors
///
/// Returns an error if the scan fails.
pub async fn find_server_by_name(
    store: &dyn InventoryStore,
    name: &str,
) -> Result<Option<ServerRecord>> {
    let servers = list_servers(store).await?;
    Ok(first_named(servers, name))
}

/// Picks the first server in `servers` with the given name.
#[must_use]
pub fn first_named(servers: impl IntoIterator<Item = ServerRecord>, name: &str) -> Option<ServerRecord> {
    servers.into_iter().find(|s| s.server_name == name)
}

/// Lists installation records, optionally restricted to one instance.
///
/// # Errors
///
/// Returns an error if the scan fails.
pub async fn list_software(
    store: &dyn InventoryStore,
    instance_id: Option<&str>,
) -> Result<Vec<SoftwareRecord>> {
    let records = store.scan_items(&ScanFilter::software()).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            InventoryRecord::Software(sw) => Some(sw),
            InventoryRecord::Server(_) => None,
        })
        .filter(|sw| instance_id.is_none_or(|id| sw.instance_id == id))
        .collect())
}
