//! Outcome recording.
//!
//! Writes identity snapshots for new targets and one installation row per
//! `(target, role)` pair after a run. Every write is best-effort: failures
//! are logged and counted, never retried and never fatal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::inventory::{
    InstallationStatus, InventoryRecord, InventoryStore, ServerRecord, SoftwareRecord,
};
use crate::planner::InstallPlan;
use crate::target::TargetDescriptor;

/// Counts of attempted writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    /// Writes that succeeded.
    pub written: usize,
    /// Writes that failed.
    pub failed: usize,
}

impl RecordSummary {
    /// Adds another summary to this one.
    pub const fn merge(&mut self, other: Self) {
        self.written += other.written;
        self.failed += other.failed;
    }

    const fn count(&mut self, ok: bool) {
        if ok {
            self.written += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Writes run outcomes to the inventory.
pub struct StatusRecorder<'a> {
    /// Inventory store.
    store: &'a dyn InventoryStore,
    /// Run identifier stamped on installation rows.
    run_id: Option<String>,
}

impl<'a> StatusRecorder<'a> {
    /// Creates a new recorder.
    #[must_use]
    pub const fn new(store: &'a dyn InventoryStore) -> Self {
        Self {
            store,
            run_id: None,
        }
    }

    /// Stamps installation rows with a run identifier.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Writes exactly one installation row. Returns true on success.
    pub async fn record(
        &self,
        target: &TargetDescriptor,
        role: &str,
        status: InstallationStatus,
    ) -> bool {
        self.record_at(target, role, status, Utc::now()).await
    }

    async fn record_at(
        &self,
        target: &TargetDescriptor,
        role: &str,
        status: InstallationStatus,
        at: DateTime<Utc>,
    ) -> bool {
        let record = InventoryRecord::Software(SoftwareRecord {
            instance_id: target.instance_id.clone(),
            software_name: role.to_string(),
            installation_status: status,
            installed_date: at,
            run_id: self.run_id.clone(),
        });

        match self.store.put_item(&record).await {
            Ok(()) => {
                info!("Updated {role} status on {}: {status}", target.name);
                true
            }
            Err(e) => {
                error!("Error updating {role} status on {}: {e}", target.name);
                false
            }
        }
    }

    /// Records one status for every `(target, role)` pair of every plan.
    pub async fn record_all(&self, plans: &[InstallPlan], status: InstallationStatus) -> RecordSummary {
        let at = Utc::now();
        let mut summary = RecordSummary::default();

        for plan in plans {
            for role in &plan.roles {
                let ok = self.record_at(&plan.target, role, status, at).await;
                summary.count(ok);
            }
        }

        debug!(
            "Recorded {} status row(s), {} failed",
            summary.written, summary.failed
        );
        summary
    }

    /// Writes the identity snapshot of every new target.
    pub async fn register_new_targets<'t>(
        &self,
        targets: impl IntoIterator<Item = &'t TargetDescriptor>,
    ) -> RecordSummary {
        let at = Utc::now();
        let mut summary = RecordSummary::default();

        for target in targets.into_iter().filter(|t| t.is_new()) {
            let record = InventoryRecord::Server(ServerRecord {
                instance_id: target.instance_id.clone(),
                server_name: target.name.clone(),
                region: target.region.clone(),
                os_type: target.platform.to_string(),
                created_at: Some(at),
            });

            match self.store.put_item(&record).await {
                Ok(()) => {
                    info!("Stored server {} in {} inventory", target.name, self.store.backend_type());
                    summary.count(true);
                }
                Err(e) => {
                    error!("Error storing server {}: {e}", target.name);
                    summary.count(false);
                }
            }
        }

        summary
    }
}
