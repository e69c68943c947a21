//! Local file-based inventory backend.
//!
//! Rows are kept in a single JSON file as a list of flat attribute maps, the
//! same shape as the DynamoDB items, so a file can be inspected or imported
//! without conversion.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, RolewrightError, StoreError};

use super::store::InventoryStore;
use super::types::{Attributes, InventoryRecord, ScanFilter};

/// Default inventory directory name.
pub const INVENTORY_DIR: &str = ".rolewright";

/// Inventory file name.
const INVENTORY_FILE: &str = "inventory.json";

/// Local file-based inventory store.
#[derive(Debug)]
pub struct LocalInventoryStore {
    /// Path to the inventory file.
    path: PathBuf,
}

impl LocalInventoryStore {
    /// Creates a store inside a base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        Self {
            path: base_dir.as_ref().join(INVENTORY_FILE),
        }
    }

    /// Creates a store backed by a specific file.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the inventory file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(&self) -> Result<Vec<Attributes>> {
        if !self.path.exists() {
            debug!("Inventory file does not exist: {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            RolewrightError::Store(StoreError::Corrupted {
                message: format!("Failed to read inventory file: {e}"),
            })
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            RolewrightError::Store(StoreError::Corrupted {
                message: format!("Failed to parse inventory file: {e}"),
            })
        })
    }

    async fn write_rows(&self, rows: &[Attributes]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                RolewrightError::Store(StoreError::backend(format!(
                    "Failed to create inventory directory: {e}"
                )))
            })?;
        }

        let content = serde_json::to_string_pretty(rows).map_err(|e| {
            RolewrightError::Store(StoreError::serialization(format!(
                "Failed to serialize inventory: {e}"
            )))
        })?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            RolewrightError::Store(StoreError::backend(format!(
                "Failed to create temp inventory file: {e}"
            )))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            RolewrightError::Store(StoreError::backend(format!(
                "Failed to write inventory file: {e}"
            )))
        })?;

        file.sync_all().await.map_err(|e| {
            RolewrightError::Store(StoreError::backend(format!(
                "Failed to sync inventory file: {e}"
            )))
        })?;

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            RolewrightError::Store(StoreError::backend(format!(
                "Failed to rename inventory file: {e}"
            )))
        })?;

        Ok(())
    }
}

#[async_trait]
impl InventoryStore for LocalInventoryStore {
    async fn put_item(&self, record: &InventoryRecord) -> Result<()> {
        let mut rows = self.read_rows().await?;
        let row = record.to_attributes();
        let record_type = record.kind().to_string();

        let existing = rows.iter_mut().find(|r| {
            r.get("instance_id").map(String::as_str) == Some(record.instance_id())
                && r.get("record_type") == Some(&record_type)
        });

        if let Some(existing) = existing {
            *existing = row;
        } else {
            rows.push(row);
        }

        debug!(
            "Writing {} / {} to {}",
            record.instance_id(),
            record_type,
            self.path.display()
        );
        self.write_rows(&rows).await
    }

    async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>> {
        let rows = self.read_rows().await?;
        info!("Scanning {} inventory rows from: {}", rows.len(), self.path.display());

        rows.iter()
            .filter(|row| {
                row.get("record_type")
                    .is_some_and(|record_type| filter.matches(record_type))
            })
            .map(|row| InventoryRecord::from_attributes(row).map_err(RolewrightError::from))
            .collect()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
