//! In-memory inventory backend.
//!
//! Rows are kept in insertion order, which makes the first-inserted rule for
//! duplicate names observable without a real table.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::error::{Result, RolewrightError, StoreError};

use super::store::InventoryStore;
use super::types::{InventoryRecord, ScanFilter};

/// In-memory inventory store.
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    rows: RwLock<Vec<InventoryRecord>>,
}

impl MemoryInventoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records, in order.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.write() {
            for record in records {
                upsert(&mut rows, record);
            }
        }
        store
    }

    /// Returns a copy of every stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<InventoryRecord>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.clone())
    }
}

fn upsert(rows: &mut Vec<InventoryRecord>, record: InventoryRecord) {
    let key = record.key();
    if let Some(existing) = rows.iter_mut().find(|r| r.key() == key) {
        *existing = record;
    } else {
        rows.push(record);
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RolewrightError {
    RolewrightError::Store(StoreError::backend(format!("inventory lock poisoned: {e}")))
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn put_item(&self, record: &InventoryRecord) -> Result<()> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        upsert(&mut rows, record.clone());
        Ok(())
    }

    async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|r| filter.matches(&r.kind().to_string()))
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
