//! End-to-end run driver.
//!
//! A run discovers the catalog, resolves the declared targets, plans their
//! software, and then (unless it is a dry run) registers new machines,
//! writes the artifacts, runs the executor once and records the outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactCompiler, ArtifactPaths, RenderedArtifacts};
use crate::catalog::CapabilityCatalog;
use crate::config::{RunConfig, TargetDeclaration};
use crate::error::Result;
use crate::inventory::{InstallationStatus, InventoryStore};
use crate::planner::{
    BlockedTarget, BucketSource, Planning, RejectedRequest, SoftwarePlanner,
};
use crate::reconciler::{RecordReconciler, SkippedTarget};
use crate::recorder::{RecordSummary, StatusRecorder};
use crate::runner::{ExecutionReport, ExecutionRunner, RunOutcome};
use crate::target::{Origin, Platform};

/// Whether a run changes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Write records, write artifacts and execute.
    Apply,
    /// Compile artifacts only.
    DryRun,
}

/// How far a run got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No target had valid software; nothing was written.
    NothingToDo,
    /// Dry run: artifacts were compiled but not written or executed.
    Planned,
    /// The executor was invoked (or failed to start) and outcomes were recorded.
    Completed,
}

/// Input of one run.
pub struct RunRequest<'r> {
    /// Declared targets.
    pub targets: &'r [TargetDeclaration],
    /// Supplier of missing transport buckets.
    pub buckets: &'r mut dyn BucketSource,
}

/// Per-target line of a run report.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    /// Target name.
    pub name: String,
    /// Instance identifier.
    pub instance_id: String,
    /// New or existing.
    pub origin: Origin,
    /// Platform used for task files.
    pub platform: Platform,
    /// Roles planned for this target.
    pub roles: Vec<String>,
    /// Recorded status, when roles were recorded.
    pub status: Option<InstallationStatus>,
}

/// Everything that was dropped or adjusted along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// Declarations that could not be resolved.
    pub skipped: Vec<SkippedTarget>,
    /// Role requests that were dropped.
    pub rejected: Vec<RejectedRequest>,
    /// Targets left out for lack of a transport bucket.
    pub blocked: Vec<BlockedTarget>,
    /// Other warnings.
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Total number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.skipped.len() + self.rejected.len() + self.blocked.len() + self.warnings.len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,
    /// Mode the run used.
    pub mode: RunMode,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// How far the run got.
    pub status: RunStatus,
    /// Executor outcome, for completed runs.
    pub outcome: Option<RunOutcome>,
    /// SHA-256 over both artifacts, when they were compiled.
    pub fingerprint: Option<String>,
    /// Resolved targets.
    pub targets: Vec<TargetSummary>,
    /// Dropped entries and warnings.
    pub diagnostics: Diagnostics,
    /// Store writes.
    pub records: RecordSummary,
    /// Rendered artifacts, for dry runs.
    pub artifacts: Option<RenderedArtifacts>,
    /// Where the artifacts were written.
    pub paths: Option<ArtifactPaths>,
    /// Executor details.
    pub execution: Option<ExecutionReport>,
}

impl RunReport {
    /// Returns true if the run needs no attention: nothing to do, a clean
    /// dry run, or a successful execution.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self.status {
            RunStatus::NothingToDo | RunStatus::Planned => true,
            RunStatus::Completed => self.outcome.is_some_and(RunOutcome::is_success),
        }
    }
}

/// Drives a run from declarations to recorded outcomes.
pub struct Workflow<'a> {
    store: &'a dyn InventoryStore,
    roles_dir: PathBuf,
    default_platform: Platform,
    runner: ExecutionRunner,
    artifact_dir: PathBuf,
    inventory_file: String,
    playbook_file: String,
}

impl<'a> Workflow<'a> {
    /// Creates a workflow from a run configuration.
    ///
    /// Relative directories are resolved against `base_dir`.
    #[must_use]
    pub fn from_config(
        config: &RunConfig,
        base_dir: Option<&Path>,
        store: &'a dyn InventoryStore,
    ) -> Self {
        Self {
            store,
            roles_dir: RunConfig::resolve_path(base_dir, &config.catalog.roles_dir),
            default_platform: config.catalog.default_platform,
            runner: ExecutionRunner::from_config(&config.executor),
            artifact_dir: RunConfig::resolve_path(base_dir, &config.executor.artifact_dir),
            inventory_file: config.executor.inventory_file.clone(),
            playbook_file: config.executor.playbook_file.clone(),
        }
    }

    /// Replaces the executor runner.
    #[must_use]
    pub fn with_runner(mut self, runner: ExecutionRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Discovers the capability catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the roles directory exists but cannot be read.
    pub fn catalog(&self) -> Result<CapabilityCatalog> {
        CapabilityCatalog::discover(&self.roles_dir, self.default_platform)
    }

    /// Executes a run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the catalog cannot be read or a dry run
    /// cannot render its artifacts. Every per-target problem is reported in
    /// the returned diagnostics instead.
    pub async fn run(&self, request: RunRequest<'_>, mode: RunMode) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting run {run_id} ({mode:?})");

        let catalog = self.catalog()?;
        let mut diagnostics = Diagnostics::default();
        if catalog.is_empty() {
            let warning = format!("No roles found in {}", self.roles_dir.display());
            warn!("{warning}");
            diagnostics.warnings.push(warning);
        }

        let resolution = RecordReconciler::new(self.store, &catalog)
            .resolve(request.targets)
            .await;
        diagnostics.skipped = resolution.skipped;
        diagnostics.warnings.extend(resolution.warnings);

        let planning = SoftwarePlanner::new(&catalog).plan(&resolution.targets, request.buckets);

        let mut report = RunReport {
            run_id,
            mode,
            started_at,
            finished_at: started_at,
            status: RunStatus::NothingToDo,
            outcome: None,
            fingerprint: None,
            targets: summarize(&planning, None),
            diagnostics,
            records: RecordSummary::default(),
            artifacts: None,
            paths: None,
            execution: None,
        };
        report.diagnostics.rejected.clone_from(&planning.rejected);
        report.diagnostics.blocked.clone_from(&planning.blocked);

        if !planning.has_work() {
            info!("No valid software selected for any target, nothing to do");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let artifacts = ArtifactCompiler::new().compile(&planning.plans);

        if mode == RunMode::DryRun {
            let rendered = artifacts.render()?;
            report.fingerprint = Some(rendered.fingerprint());
            report.artifacts = Some(rendered);
            report.status = RunStatus::Planned;
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let recorder = StatusRecorder::new(self.store).with_run_id(report.run_id.clone());
        report.records = recorder.register_new_targets(planning.all_targets()).await;

        let execution = match artifacts
            .write_to(&self.artifact_dir, &self.inventory_file, &self.playbook_file)
            .await
        {
            Ok(paths) => {
                report.fingerprint = artifacts.fingerprint().ok();
                let execution = self
                    .runner
                    .run(
                        &paths.dir,
                        Path::new(&self.inventory_file),
                        Path::new(&self.playbook_file),
                    )
                    .await;
                report.paths = Some(paths);
                execution
            }
            Err(e) => {
                warn!("Artifacts could not be written, executor not started: {e}");
                ExecutionReport::not_started(e.to_string())
            }
        };

        let status = if execution.outcome.is_success() {
            InstallationStatus::Success
        } else {
            InstallationStatus::Failed
        };
        info!("Playbook execution: {}", execution.outcome);

        let written = recorder.record_all(&planning.plans, status).await;
        report.records.merge(written);

        report.status = RunStatus::Completed;
        report.outcome = Some(execution.outcome);
        report.targets = summarize(&planning, Some(status));
        report.execution = Some(execution);
        report.finished_at = Utc::now();

        info!(
            "Run {} finished: {} record(s) written, {} failed",
            report.run_id, report.records.written, report.records.failed
        );
        Ok(report)
    }
}

fn summarize(planning: &Planning, status: Option<InstallationStatus>) -> Vec<TargetSummary> {
    planning
        .plans
        .iter()
        .map(|plan| TargetSummary {
            name: plan.target.name.clone(),
            instance_id: plan.target.instance_id.clone(),
            origin: plan.target.origin,
            platform: plan.target.platform,
            roles: plan.roles.clone(),
            status: status.filter(|_| !plan.is_empty()),
        })
        .chain(planning.blocked.iter().map(|blocked| TargetSummary {
            name: blocked.target.name.clone(),
            instance_id: blocked.target.instance_id.clone(),
            origin: blocked.target.origin,
            platform: blocked.target.platform,
            roles: Vec::new(),
            status: None,
        }))
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{ExistingTarget, NewTarget, SoftwareRequest};
    use crate::error::ReconcileError;
    use crate::inventory::{
        InventoryRecord, MemoryInventoryStore, ServerRecord, list_servers, list_software,
    };
    use crate::planner::DeclaredBuckets;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: RunConfig,
    }

    impl Fixture {
        fn new(executor_body: &str) -> Self {
            let dir = TempDir::new().expect("Failed to create temp dir");
            for role_file in [
                "roles/nginx/tasks/ubuntu.yml",
                "roles/redis/tasks/ubuntu.yml",
                "roles/redis/tasks/centos.yml",
            ] {
                let path = dir.path().join(role_file);
                std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
                std::fs::write(path, "---\n").expect("write");
            }
            std::fs::write(dir.path().join("executor.sh"), format!("{executor_body}\n"))
                .expect("write");

            let mut config = RunConfig::default();
            config.executor.artifact_dir = String::from("out");
            Self { dir, config }
        }

        fn workflow<'a>(&self, store: &'a MemoryInventoryStore) -> Workflow<'a> {
            let runner = ExecutionRunner::new("sh", Duration::from_secs(10))
                .with_leading_args([self.dir.path().join("executor.sh").display().to_string()]);
            Workflow::from_config(&self.config, Some(self.dir.path()), store).with_runner(runner)
        }
    }

    fn new_target(name: &str, software: &str) -> TargetDeclaration {
        TargetDeclaration::New(NewTarget {
            name: name.to_string(),
            instance_id: format!("i-{name}"),
            region: String::from("ap-south-1"),
            platform: String::from("ubuntu"),
            bucket: Some(String::from("ssm-bucket")),
            software: SoftwareRequest::from(software),
        })
    }

    fn existing_target(name: &str, software: &str) -> TargetDeclaration {
        TargetDeclaration::Existing(ExistingTarget {
            name: name.to_string(),
            bucket: None,
            software: SoftwareRequest::from(software),
        })
    }

    #[tokio::test]
    async fn test_successful_apply_records_every_pair() {
        let fixture = Fixture::new("exit 0");
        let store = MemoryInventoryStore::with_records([InventoryRecord::Server(ServerRecord {
            instance_id: String::from("i-db1"),
            server_name: String::from("db1"),
            region: String::from("ap-south-1"),
            os_type: String::from("centos"),
            created_at: None,
        })]);
        let targets = vec![
            new_target("web1", "nginx, redis"),
            existing_target("db1", "nginx, redis"),
        ];
        let mut buckets = DeclaredBuckets::default().with("db1", "ssm-db1");

        let report = fixture
            .workflow(&store)
            .run(
                RunRequest {
                    targets: &targets,
                    buckets: &mut buckets,
                },
                RunMode::Apply,
            )
            .await
            .expect("run failed");

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.outcome, Some(RunOutcome::Success));
        assert!(report.succeeded());
        assert_eq!(report.diagnostics.rejected.len(), 1);
        assert!(report.fingerprint.is_some());

        let rows = list_software(&store, None).await.expect("scan failed");
        let mut pairs: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.instance_id.clone(), r.software_name.clone()))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (String::from("i-db1"), String::from("redis")),
                (String::from("i-web1"), String::from("nginx")),
                (String::from("i-web1"), String::from("redis")),
            ]
        );
        assert!(rows.iter().all(|r| r.installation_status == InstallationStatus::Success));

        let servers = list_servers(&store).await.expect("scan failed");
        assert_eq!(servers.len(), 2);
        assert!(fixture.dir.path().join("out/inventory.yml").exists());
        assert!(fixture.dir.path().join("out/main.yml").exists());
    }

    #[tokio::test]
    async fn test_failed_execution_records_failed() {
        let fixture = Fixture::new("exit 2");
        let store = MemoryInventoryStore::new();
        let targets = vec![new_target("web1", "nginx")];
        let mut buckets = DeclaredBuckets::default();

        let report = fixture
            .workflow(&store)
            .run(
                RunRequest {
                    targets: &targets,
                    buckets: &mut buckets,
                },
                RunMode::Apply,
            )
            .await
            .expect("run failed");

        assert_eq!(report.outcome, Some(RunOutcome::Failure));
        assert!(!report.succeeded());
        let rows = list_software(&store, None).await.expect("scan failed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].installation_status, InstallationStatus::Failed);
    }

    #[tokio::test]
    async fn test_nothing_to_do_writes_nothing() {
        let fixture = Fixture::new("exit 0");
        let store = MemoryInventoryStore::new();
        let targets = vec![new_target("web1", "mysql"), existing_target("db1", "redis")];
        let mut buckets = DeclaredBuckets::default();

        let report = fixture
            .workflow(&store)
            .run(
                RunRequest {
                    targets: &targets,
                    buckets: &mut buckets,
                },
                RunMode::Apply,
            )
            .await
            .expect("run failed");

        assert_eq!(report.status, RunStatus::NothingToDo);
        assert_eq!(report.diagnostics.skipped.len(), 1);
        assert!(store.snapshot().expect("snapshot").is_empty());
        assert!(!fixture.dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_dry_run_compiles_without_side_effects() {
        let fixture = Fixture::new("exit 1");
        let store = MemoryInventoryStore::new();
        let targets = vec![new_target("web1", "nginx")];
        let mut buckets = DeclaredBuckets::default();

        let report = fixture
            .workflow(&store)
            .run(
                RunRequest {
                    targets: &targets,
                    buckets: &mut buckets,
                },
                RunMode::DryRun,
            )
            .await
            .expect("run failed");

        assert_eq!(report.status, RunStatus::Planned);
        let artifacts = report.artifacts.expect("artifacts");
        assert!(artifacts.playbook.contains("Install nginx"));
        assert_eq!(report.fingerprint, Some(artifacts.fingerprint()));
        assert!(store.snapshot().expect("snapshot").is_empty());
        assert!(report.execution.is_none());
    }

    #[tokio::test]
    async fn test_unwritable_artifacts_still_record_failure() {
        let mut fixture = Fixture::new("exit 0");
        std::fs::write(fixture.dir.path().join("blocker"), "file").expect("write");
        fixture.config.executor.artifact_dir = String::from("blocker/out");
        let store = MemoryInventoryStore::new();
        let targets = vec![new_target("web1", "nginx")];
        let mut buckets = DeclaredBuckets::default();

        let report = fixture
            .workflow(&store)
            .run(
                RunRequest {
                    targets: &targets,
                    buckets: &mut buckets,
                },
                RunMode::Apply,
            )
            .await
            .expect("run failed");

        assert_eq!(report.outcome, Some(RunOutcome::Failure));
        let rows = list_software(&store, None).await.expect("scan failed");
        assert_eq!(rows[0].installation_status, InstallationStatus::Failed);
    }

    fn stored_server(id: &str, name: &str, region: &str, os: &str) -> InventoryRecord {
        InventoryRecord::Server(ServerRecord {
            instance_id: id.to_string(),
            server_name: name.to_string(),
            region: region.to_string(),
            os_type: os.to_string(),
            created_at: None,
        })
    }

    async fn apply(
        fixture: &Fixture,
        store: &MemoryInventoryStore,
        targets: &[TargetDeclaration],
    ) -> RunReport {
        let mut buckets = DeclaredBuckets::default();
        fixture
            .workflow(store)
            .run(
                RunRequest {
                    targets,
                    buckets: &mut buckets,
                },
                RunMode::Apply,
            )
            .await
            .expect("run failed")
    }

    #[tokio::test]
    async fn test_new_target_never_rewrites_stored_instance() {
        let fixture = Fixture::new("exit 0");
        let store = MemoryInventoryStore::with_records([stored_server(
            "i-web1",
            "db1",
            "eu-west-1",
            "centos",
        )]);
        let before = store.snapshot().expect("snapshot");

        let report = apply(&fixture, &store, &[new_target("web1", "nginx")]).await;

        assert_eq!(report.status, RunStatus::NothingToDo);
        assert!(matches!(
            &report.diagnostics.skipped[0].reason,
            ReconcileError::AlreadyRegistered { field, .. } if field == "instance_id"
        ));
        assert_eq!(store.snapshot().expect("snapshot"), before);
    }

    #[tokio::test]
    async fn test_new_target_never_duplicates_stored_name() {
        let fixture = Fixture::new("exit 0");
        let store = MemoryInventoryStore::with_records([stored_server(
            "i-old",
            "web1",
            "ap-south-1",
            "ubuntu",
        )]);

        let report = apply(&fixture, &store, &[new_target("web1", "nginx")]).await;

        assert_eq!(report.diagnostics.skipped.len(), 1);
        assert!(matches!(
            &report.diagnostics.skipped[0].reason,
            ReconcileError::AlreadyRegistered { field, .. } if field == "name"
        ));
        let servers = list_servers(&store).await.expect("scan failed");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].instance_id, "i-old");
    }

    #[tokio::test]
    async fn test_repeated_apply_keeps_first_snapshot() {
        let fixture = Fixture::new("exit 0");
        let store = MemoryInventoryStore::new();
        let targets = vec![new_target("web1", "nginx")];

        let first_report = apply(&fixture, &store, &targets).await;
        assert_eq!(first_report.targets[0].origin, Origin::New);
        let first = list_servers(&store).await.expect("scan failed");

        let report = apply(&fixture, &store, &targets).await;
        assert!(report.succeeded());
        assert!(report.diagnostics.skipped.is_empty());
        assert_eq!(report.targets[0].origin, Origin::Existing);

        let second = list_servers(&store).await.expect("scan failed");
        assert_eq!(first, second);
        assert_eq!(list_software(&store, None).await.expect("scan failed").len(), 1);
    }
}
