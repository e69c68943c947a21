//! DynamoDB-based inventory backend.
//!
//! The table uses `instance_id` as partition key and `record_type` as sort
//! key. Every attribute is written as a string. Table creation is left to
//! the operator; this backend only reads and writes items.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{ConfigError, Result, RolewrightError, StoreError};

use super::store::InventoryStore;
use super::types::{Attributes, InventoryRecord, ScanFilter, parse_timestamp};

/// DynamoDB-based inventory store.
#[derive(Debug, Clone)]
pub struct DynamoInventoryStore {
    /// DynamoDB client.
    client: Client,
    /// Table name.
    table: String,
}

impl DynamoInventoryStore {
    /// Creates a new DynamoDB inventory store from the store configuration.
    ///
    /// Credentials come from the ambient AWS configuration; the table and the
    /// optional region come from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no table is configured.
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let table = table_name(config)?;

        let sdk_config = if let Some(region_str) = config.region.as_deref() {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        info!("Using DynamoDB inventory table: {table}");
        Ok(Self::with_client(Client::new(&sdk_config), table))
    }

    /// Creates a new DynamoDB inventory store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

}

fn table_name(config: &StoreConfig) -> Result<&str> {
    config
        .table
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RolewrightError::Config(ConfigError::validation(
                "DynamoDB backend requires a table name",
                "store.table",
            ))
        })
}

fn to_item(record: &InventoryRecord) -> HashMap<String, AttributeValue> {
    record
        .to_attributes()
        .into_iter()
        .map(|(name, value)| (name, AttributeValue::S(value)))
        .collect()
}

fn from_item(item: HashMap<String, AttributeValue>) -> Attributes {
    item.into_iter()
        .filter_map(|(name, value)| match value {
            AttributeValue::S(s) | AttributeValue::N(s) => Some((name, s)),
            AttributeValue::Bool(b) => Some((name, b.to_string())),
            _ => {
                debug!("Ignoring non-scalar attribute '{name}'");
                None
            }
        })
        .collect()
}

/// Orders rows oldest first so that name lookups keep the first-inserted
/// snapshot. Rows without `created_at` keep their scan order at the end.
fn sort_by_creation(rows: &mut [Attributes]) {
    rows.sort_by_key(|row| {
        let created = row
            .get("created_at")
            .and_then(|value| parse_timestamp(value).ok());
        (created.is_none(), created)
    });
}

#[async_trait]
impl InventoryStore for DynamoInventoryStore {
    async fn put_item(&self, record: &InventoryRecord) -> Result<()> {
        debug!(
            "Putting {} / {} into {}",
            record.instance_id(),
            record.kind(),
            self.table
        );

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| {
                RolewrightError::Store(StoreError::backend(format!(
                    "DynamoDB put error: {}",
                    DisplayErrorContext(&e)
                )))
            })?;

        Ok(())
    }

    async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>> {
        let mut rows: Vec<Attributes> = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take());

            request = match filter {
                ScanFilter::All => request,
                ScanFilter::RecordType(value) => request
                    .filter_expression("#rt = :rt")
                    .expression_attribute_names("#rt", "record_type")
                    .expression_attribute_values(":rt", AttributeValue::S(value.clone())),
                ScanFilter::RecordTypePrefix(prefix) => request
                    .filter_expression("begins_with(#rt, :rt)")
                    .expression_attribute_names("#rt", "record_type")
                    .expression_attribute_values(":rt", AttributeValue::S(prefix.clone())),
            };

            let output = request.send().await.map_err(|e| {
                RolewrightError::Store(StoreError::backend(format!(
                    "DynamoDB scan error: {}",
                    DisplayErrorContext(&e)
                )))
            })?;

            rows.extend(output.items.unwrap_or_default().into_iter().map(from_item));

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        sort_by_creation(&mut rows);

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match InventoryRecord::from_attributes(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable item in {}: {e}", self.table),
            }
        }

        debug!("Scanned {} items from {}", records.len(), self.table);
        Ok(records)
    }

    fn backend_type(&self) -> &'static str {
        "dynamodb"
    }
}
