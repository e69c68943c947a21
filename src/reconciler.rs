//! Reconciler for declared targets.
//!
//! This module decides whether each declared target is a new machine or one
//! already recorded in the inventory, and merges the declaration with the
//! stored identity into a [`TargetDescriptor`]. Bad entries are skipped with
//! a diagnostic; the batch always completes.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::catalog::CapabilityCatalog;
use crate::config::{ExistingTarget, NewTarget, TargetDeclaration};
use crate::error::ReconcileError;
use crate::inventory::{InventoryStore, ServerRecord, first_named, list_servers};
use crate::target::{Origin, TargetDescriptor};

/// A resolved target together with its raw software request.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTarget {
    /// Resolved descriptor.
    pub descriptor: TargetDescriptor,
    /// Comma-separated requested roles, as declared.
    pub requested: String,
}

/// A declared entry that could not be resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTarget {
    /// Position of the entry in the declaration list.
    pub index: usize,
    /// Declared name, possibly empty.
    pub name: String,
    /// Why the entry was skipped.
    pub reason: ReconcileError,
}

/// Outcome of resolving a batch of declarations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    /// Resolved targets in declaration order.
    pub targets: Vec<ResolvedTarget>,
    /// Entries that were skipped.
    pub skipped: Vec<SkippedTarget>,
    /// Non-fatal diagnostics such as platform fallbacks.
    pub warnings: Vec<String>,
}

/// Resolves declared targets against the inventory.
pub struct RecordReconciler<'a> {
    /// Inventory store.
    store: &'a dyn InventoryStore,
    /// Catalog providing the default platform.
    catalog: &'a CapabilityCatalog,
}

impl<'a> RecordReconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(store: &'a dyn InventoryStore, catalog: &'a CapabilityCatalog) -> Self {
        Self { store, catalog }
    }

    /// Resolves a batch of declarations.
    ///
    /// The inventory is scanned once for a non-empty batch. Existing
    /// targets are looked up in it and new targets are checked against it,
    /// so a stored snapshot is never rewritten or shadowed by a new entry.
    pub async fn resolve(&self, declared: &[TargetDeclaration]) -> Resolution {
        info!("Resolving {} declared target(s)", declared.len());

        let servers = if declared.is_empty() {
            Ok(Vec::new())
        } else {
            match list_servers(self.store).await {
                Ok(servers) => {
                    debug!(
                        "Loaded {} server record(s) from {} inventory",
                        servers.len(),
                        self.store.backend_type()
                    );
                    Ok(servers)
                }
                Err(e) => {
                    warn!("Failed to list servers from inventory: {e}");
                    Err(e.to_string())
                }
            }
        };

        let mut resolution = Resolution::default();
        let mut seen_names: HashSet<String> = HashSet::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (index, declaration) in declared.iter().enumerate() {
            let stored = servers.as_deref().map_err(String::as_str);
            let outcome = match declaration {
                TargetDeclaration::New(target) => self.resolve_new(target, stored),
                TargetDeclaration::Existing(target) => self.resolve_existing(target, stored),
            };

            let outcome = outcome.and_then(|(descriptor, warning)| {
                if seen_names.contains(&descriptor.name) {
                    return Err(ReconcileError::DuplicateTarget {
                        name: descriptor.name,
                        field: String::from("name"),
                    });
                }
                if seen_ids.contains(&descriptor.instance_id) {
                    return Err(ReconcileError::DuplicateTarget {
                        name: descriptor.name,
                        field: String::from("instance_id"),
                    });
                }
                Ok((descriptor, warning))
            });

            match outcome {
                Ok((descriptor, warning)) => {
                    if let Some(warning) = warning {
                        warn!("{warning}");
                        resolution.warnings.push(warning);
                    }
                    debug!(
                        "Resolved {} target '{}' ({})",
                        descriptor.origin, descriptor.name, descriptor.instance_id
                    );
                    seen_names.insert(descriptor.name.clone());
                    seen_ids.insert(descriptor.instance_id.clone());
                    resolution.targets.push(ResolvedTarget {
                        descriptor,
                        requested: declaration.software().as_csv(),
                    });
                }
                Err(reason) => {
                    warn!("Skipping target #{index}: {reason}");
                    resolution.skipped.push(SkippedTarget {
                        index,
                        name: declaration.name().trim().to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Resolved {} target(s), skipped {}",
            resolution.targets.len(),
            resolution.skipped.len()
        );
        resolution
    }

    /// Builds a descriptor for a first-time machine.
    ///
    /// A declaration matching a stored server on both name and instance id
    /// resolves to that stored snapshot. A match on only one of them is a
    /// collision and the entry is skipped.
    fn resolve_new(
        &self,
        target: &NewTarget,
        servers: Result<&[ServerRecord], &str>,
    ) -> Result<(TargetDescriptor, Option<String>), ReconcileError> {
        let trimmed = NewTarget {
            name: target.name.trim().to_string(),
            instance_id: target.instance_id.trim().to_string(),
            region: target.region.trim().to_string(),
            platform: target.platform.trim().to_string(),
            bucket: target.bucket.as_deref().map(str::trim).map(str::to_string),
            software: target.software.clone(),
        };

        if let Err(errors) = trimmed.validate() {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(ToString::to_string)
                .collect();
            fields.sort();
            let field = fields.into_iter().next().unwrap_or_else(|| String::from("name"));
            return Err(ReconcileError::invalid_field(
                trimmed.name,
                field,
                "must not be empty",
            ));
        }

        let servers = servers.map_err(|message| ReconcileError::StoreUnavailable {
            name: trimmed.name.clone(),
            message: message.to_string(),
        })?;
        let bucket = trimmed.bucket.filter(|b| !b.is_empty());

        if let Some(stored) = servers
            .iter()
            .find(|s| s.instance_id == trimmed.instance_id && s.server_name == trimmed.name)
        {
            debug!(
                "'{}' ({}) is already registered, keeping the stored snapshot",
                trimmed.name, trimmed.instance_id
            );
            return Ok(self.stored_descriptor(stored.clone(), bucket));
        }

        if let Some(stored) = servers
            .iter()
            .find(|s| s.instance_id == trimmed.instance_id || s.server_name == trimmed.name)
        {
            let field = if stored.instance_id == trimmed.instance_id {
                "instance_id"
            } else {
                "name"
            };
            return Err(ReconcileError::AlreadyRegistered {
                name: trimmed.name,
                field: field.to_string(),
                stored_name: stored.server_name.clone(),
                stored_id: stored.instance_id.clone(),
            });
        }

        let (platform, warning) = self.catalog.normalize_platform(&trimmed.platform);
        let warning = warning.map(|w| format!("{}: {w}", trimmed.name));

        Ok((
            TargetDescriptor {
                instance_id: trimmed.instance_id,
                name: trimmed.name,
                region: trimmed.region,
                platform,
                transport_bucket: bucket,
                origin: Origin::New,
            },
            warning,
        ))
    }

    /// Builds a descriptor for a machine looked up by name.
    fn resolve_existing(
        &self,
        target: &ExistingTarget,
        servers: Result<&[ServerRecord], &str>,
    ) -> Result<(TargetDescriptor, Option<String>), ReconcileError> {
        let name = target.name.trim();
        if name.is_empty() {
            return Err(ReconcileError::invalid_field(name, "name", "must not be empty"));
        }

        let servers = servers.map_err(|message| ReconcileError::StoreUnavailable {
            name: name.to_string(),
            message: message.to_string(),
        })?;

        if servers.is_empty() {
            return Err(ReconcileError::EmptyInventory {
                name: name.to_string(),
            });
        }

        let record = first_named(servers.iter().cloned(), name).ok_or_else(|| {
            ReconcileError::NotFound {
                name: name.to_string(),
            }
        })?;

        Ok(self.stored_descriptor(record, None))
    }

    /// Builds an existing-origin descriptor from a stored snapshot.
    fn stored_descriptor(
        &self,
        record: ServerRecord,
        bucket: Option<String>,
    ) -> (TargetDescriptor, Option<String>) {
        let (platform, warning) = self.catalog.normalize_platform(&record.os_type);
        let warning = warning.map(|w| format!("{} (stored): {w}", record.server_name));

        (
            TargetDescriptor {
                instance_id: record.instance_id,
                name: record.server_name,
                region: record.region,
                platform,
                transport_bucket: bucket,
                origin: Origin::Existing,
            },
            warning,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SoftwareRequest;
    use crate::error::{Result, RolewrightError, StoreError};
    use crate::inventory::{InventoryRecord, MemoryInventoryStore, ScanFilter};
    use crate::target::Platform;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Store {}

        #[async_trait]
        impl InventoryStore for Store {
            async fn put_item(&self, record: &InventoryRecord) -> Result<()>;
            async fn scan_items(&self, filter: &ScanFilter) -> Result<Vec<InventoryRecord>>;
            fn backend_type(&self) -> &'static str;
        }
    }

    fn new_target(name: &str, id: &str) -> TargetDeclaration {
        TargetDeclaration::New(NewTarget {
            name: name.to_string(),
            instance_id: id.to_string(),
            region: String::from("ap-south-1"),
            platform: String::from("ubuntu"),
            bucket: Some(String::from("ssm-bucket")),
            software: SoftwareRequest::from("nginx"),
        })
    }

    fn existing_target(name: &str) -> TargetDeclaration {
        TargetDeclaration::Existing(ExistingTarget {
            name: name.to_string(),
            bucket: None,
            software: SoftwareRequest::from("redis"),
        })
    }

    fn server(id: &str, name: &str, os: &str) -> InventoryRecord {
        InventoryRecord::Server(ServerRecord {
            instance_id: id.to_string(),
            server_name: name.to_string(),
            region: String::from("ap-south-1"),
            os_type: os.to_string(),
            created_at: None,
        })
    }

    fn catalog() -> CapabilityCatalog {
        CapabilityCatalog::from_entries(std::iter::empty(), Platform::Ubuntu)
    }

    #[tokio::test]
    async fn test_new_plus_existing_against_empty_store() {
        let store = MemoryInventoryStore::new();
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler
            .resolve(&[new_target("web1", "i-1"), existing_target("db1")])
            .await;

        assert_eq!(resolution.targets.len(), 1);
        assert_eq!(resolution.targets[0].descriptor.name, "web1");
        assert_eq!(resolution.targets[0].descriptor.origin, Origin::New);
        assert_eq!(resolution.skipped.len(), 1);
        assert!(matches!(
            resolution.skipped[0].reason,
            ReconcileError::EmptyInventory { .. }
        ));
    }

    #[tokio::test]
    async fn test_new_target_fields_are_trimmed_and_validated() {
        let store = MemoryInventoryStore::new();
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let blank_id = TargetDeclaration::New(NewTarget {
            name: String::from(" web2 "),
            instance_id: String::from("   "),
            region: String::from("ap-south-1"),
            platform: String::new(),
            bucket: None,
            software: SoftwareRequest::default(),
        });
        let padded = TargetDeclaration::New(NewTarget {
            name: String::from(" web1 "),
            instance_id: String::from(" i-1 "),
            region: String::from(" ap-south-1 "),
            platform: String::from("Windows"),
            bucket: Some(String::from(" ")),
            software: SoftwareRequest::default(),
        });

        let resolution = reconciler.resolve(&[blank_id, padded]).await;

        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(
            resolution.skipped[0].reason,
            ReconcileError::invalid_field("web2", "instance_id", "must not be empty")
        );

        let web1 = &resolution.targets[0].descriptor;
        assert_eq!(web1.name, "web1");
        assert_eq!(web1.instance_id, "i-1");
        assert_eq!(web1.platform, Platform::Ubuntu);
        assert_eq!(web1.transport_bucket, None);
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_lookup_is_idempotent() {
        let store = MemoryInventoryStore::with_records([server("i-7", "db1", "centos")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let first = reconciler.resolve(&[existing_target("db1")]).await;
        let second = reconciler.resolve(&[existing_target("db1")]).await;

        assert_eq!(first.targets[0].descriptor, second.targets[0].descriptor);
        let db1 = &first.targets[0].descriptor;
        assert_eq!(db1.instance_id, "i-7");
        assert_eq!(db1.platform, Platform::Centos);
        assert_eq!(db1.origin, Origin::Existing);
        assert!(db1.transport_bucket.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_server_names_first_inserted_wins() {
        let store = MemoryInventoryStore::with_records([
            server("i-1", "db1", "ubuntu"),
            server("i-2", "db1", "debian"),
        ]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler.resolve(&[existing_target("db1")]).await;
        assert_eq!(resolution.targets[0].descriptor.instance_id, "i-1");
    }

    #[tokio::test]
    async fn test_unknown_existing_name_is_skipped() {
        let store = MemoryInventoryStore::with_records([server("i-1", "db1", "ubuntu")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler
            .resolve(&[existing_target("db9"), existing_target("db1")])
            .await;

        assert_eq!(resolution.targets.len(), 1);
        assert_eq!(
            resolution.skipped[0].reason,
            ReconcileError::NotFound {
                name: String::from("db9")
            }
        );
    }

    #[tokio::test]
    async fn test_duplicates_within_batch_are_skipped() {
        let store = MemoryInventoryStore::with_records([server("i-1", "db1", "ubuntu")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler
            .resolve(&[
                existing_target("db1"),
                existing_target("db1"),
                new_target("web1", "i-5"),
                new_target("web2", "i-5"),
            ])
            .await;

        assert_eq!(resolution.targets.len(), 2);
        let fields: Vec<&str> = resolution
            .skipped
            .iter()
            .map(|s| match &s.reason {
                ReconcileError::DuplicateTarget { field, .. } => field.as_str(),
                _ => "other",
            })
            .collect();
        assert_eq!(fields, vec!["name", "instance_id"]);
    }

    #[tokio::test]
    async fn test_store_failure_skips_every_entry() {
        let mut store = MockStore::new();
        store.expect_scan_items().times(1).returning(|_| {
            Err(RolewrightError::Store(StoreError::backend("table unavailable")))
        });
        store.expect_backend_type().return_const("mock");

        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler
            .resolve(&[existing_target("db1"), new_target("web1", "i-1"), existing_target("db2")])
            .await;

        assert!(resolution.targets.is_empty());
        assert_eq!(resolution.skipped.len(), 3);
        assert!(resolution.skipped.iter().all(|s| s.reason.is_lookup()));
    }

    #[tokio::test]
    async fn test_new_only_batch_scans_once() {
        let mut store = MockStore::new();
        store.expect_scan_items().times(1).returning(|_| Ok(Vec::new()));
        store.expect_backend_type().return_const("mock");

        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler
            .resolve(&[new_target("web1", "i-1"), new_target("web2", "i-2")])
            .await;
        assert_eq!(resolution.targets.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_never_scans() {
        let mut store = MockStore::new();
        store.expect_scan_items().times(0);

        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler.resolve(&[]).await;
        assert!(resolution.targets.is_empty());
        assert!(resolution.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_new_target_with_stored_instance_id_is_skipped() {
        let store = MemoryInventoryStore::with_records([server("i-web1", "db1", "centos")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler.resolve(&[new_target("web1", "i-web1")]).await;

        assert!(resolution.targets.is_empty());
        assert_eq!(
            resolution.skipped[0].reason,
            ReconcileError::AlreadyRegistered {
                name: String::from("web1"),
                field: String::from("instance_id"),
                stored_name: String::from("db1"),
                stored_id: String::from("i-web1"),
            }
        );
    }

    #[tokio::test]
    async fn test_new_target_with_stored_name_is_skipped() {
        let store = MemoryInventoryStore::with_records([server("i-old", "web1", "ubuntu")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler.resolve(&[new_target(" web1 ", "i-web1")]).await;

        assert!(resolution.targets.is_empty());
        assert!(matches!(
            &resolution.skipped[0].reason,
            ReconcileError::AlreadyRegistered { field, stored_id, .. }
                if field == "name" && stored_id == "i-old"
        ));
    }

    #[tokio::test]
    async fn test_redeclared_new_target_keeps_stored_snapshot() {
        let store = MemoryInventoryStore::with_records([server("i-1", "web1", "centos")]);
        let catalog = catalog();
        let reconciler = RecordReconciler::new(&store, &catalog);

        let resolution = reconciler.resolve(&[new_target("web1", "i-1")]).await;

        assert!(resolution.skipped.is_empty());
        let web1 = &resolution.targets[0].descriptor;
        assert_eq!(web1.origin, Origin::Existing);
        assert_eq!(web1.platform, Platform::Centos);
        assert_eq!(web1.transport_bucket.as_deref(), Some("ssm-bucket"));
    }
}
