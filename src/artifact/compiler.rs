//! Compilation of install plans into artifacts.
//!
//! Compilation is a pure function of the plans. Writing, hashing and
//! rendering live on [`ArtifactSet`].

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::ArtifactError;
use crate::planner::InstallPlan;

use super::graph::{IncludeRole, Play, Task, TaskGraph};
use super::manifest::{CONNECTION, HostVars, InventoryManifest};

/// The two coupled artifacts consumed by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    /// Host inventory.
    pub manifest: InventoryManifest,
    /// Task graph.
    pub graph: TaskGraph,
}

/// Both artifacts rendered as YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifacts {
    /// Inventory document.
    pub inventory: String,
    /// Playbook document.
    pub playbook: String,
}

/// Where the artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    /// Directory holding both files.
    pub dir: PathBuf,
    /// Inventory file.
    pub inventory: PathBuf,
    /// Playbook file.
    pub playbook: PathBuf,
}

/// Compiles install plans into artifacts.
#[derive(Debug, Default)]
pub struct ArtifactCompiler;

impl ArtifactCompiler {
    /// Creates a new compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compiles plans. Empty plans and plans without a transport bucket
    /// appear in neither artifact.
    #[must_use]
    pub fn compile(&self, plans: &[InstallPlan]) -> ArtifactSet {
        let mut set = ArtifactSet::default();

        for plan in plans.iter().filter(|p| !p.is_empty()) {
            let target = &plan.target;
            let Some(bucket) = target.bucket() else {
                warn!("Leaving out {}: no transport bucket", target.name);
                continue;
            };

            set.manifest.push(
                target.name.clone(),
                HostVars {
                    ansible_host: target.instance_id.clone(),
                    ansible_connection: CONNECTION.to_string(),
                    ansible_aws_ssm_region: target.region.clone(),
                    ansible_aws_ssm_bucket_name: bucket.to_string(),
                },
            );

            let tasks_from = target.platform.task_file();
            set.graph.push(Play {
                name: format!("Install software on {}", target.name),
                hosts: target.name.clone(),
                escalate: true,
                tasks: plan
                    .roles
                    .iter()
                    .map(|role| Task {
                        name: format!("Install {role}"),
                        include_role: IncludeRole {
                            name: role.clone(),
                            tasks_from: tasks_from.clone(),
                        },
                    })
                    .collect(),
            });
        }

        debug!("Compiled artifacts for {} host(s)", set.manifest.len());
        set
    }
}

impl ArtifactSet {
    /// Returns true if there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty() && self.graph.is_empty()
    }

    /// Renders both documents.
    ///
    /// # Errors
    ///
    /// Returns an error if either document cannot be serialized.
    pub fn render(&self) -> Result<RenderedArtifacts, ArtifactError> {
        let inventory =
            serde_yaml::to_string(&self.manifest).map_err(|e| ArtifactError::Serialization {
                artifact: String::from("inventory"),
                message: e.to_string(),
            })?;
        let playbook =
            serde_yaml::to_string(&self.graph).map_err(|e| ArtifactError::Serialization {
                artifact: String::from("playbook"),
                message: e.to_string(),
            })?;

        Ok(RenderedArtifacts {
            inventory,
            playbook,
        })
    }

    /// SHA-256 over both rendered documents, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn fingerprint(&self) -> Result<String, ArtifactError> {
        Ok(self.render()?.fingerprint())
    }

    /// Writes both documents into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub async fn write_to(
        &self,
        dir: &Path,
        inventory_file: &str,
        playbook_file: &str,
    ) -> Result<ArtifactPaths, ArtifactError> {
        let rendered = self.render()?;

        fs::create_dir_all(dir).await.map_err(|e| ArtifactError::Write {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let paths = ArtifactPaths {
            dir: dir.to_path_buf(),
            inventory: dir.join(inventory_file),
            playbook: dir.join(playbook_file),
        };

        for (path, content) in [
            (&paths.inventory, &rendered.inventory),
            (&paths.playbook, &rendered.playbook),
        ] {
            fs::write(path, content).await.map_err(|e| ArtifactError::Write {
                path: path.clone(),
                message: e.to_string(),
            })?;
            info!("Created {}", path.display());
        }

        Ok(paths)
    }
}

impl RenderedArtifacts {
    /// SHA-256 over both documents, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inventory.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.playbook.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Origin, Platform, TargetDescriptor};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn plan(name: &str, platform: Platform, roles: &[&str]) -> InstallPlan {
        InstallPlan {
            target: TargetDescriptor {
                instance_id: format!("i-{name}"),
                name: name.to_string(),
                region: String::from("ap-south-1"),
                platform,
                transport_bucket: Some(String::from("ssm-bucket")),
                origin: Origin::New,
            },
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_manifest_hosts_match_graph_hosts() {
        let plans = vec![
            plan("web1", Platform::Ubuntu, &["nginx", "redis"]),
            plan("idle", Platform::Ubuntu, &[]),
            plan("db1", Platform::Centos, &["redis"]),
        ];

        let set = ArtifactCompiler::new().compile(&plans);

        let hosts: BTreeSet<&str> = set.manifest.host_names().collect();
        let plays: BTreeSet<&str> = set.graph.hosts().collect();
        assert_eq!(hosts, plays);
        assert!(!hosts.contains("idle"));
        assert_eq!(set.manifest.host_names().collect::<Vec<_>>(), vec!["web1", "db1"]);
        assert_eq!(set.manifest.host("db1").map(|h| h.ansible_host.as_str()), Some("i-db1"));
        assert!(set.manifest.host("idle").is_none());
        assert_eq!(set.graph.plays()[0].tasks.len(), 2);
    }

    #[test]
    fn test_plan_without_bucket_is_left_out() {
        let mut unbucketed = plan("db1", Platform::Centos, &["redis"]);
        unbucketed.target.transport_bucket = Some(String::from("  "));
        let plans = vec![plan("web1", Platform::Ubuntu, &["nginx"]), unbucketed];

        let set = ArtifactCompiler::new().compile(&plans);

        assert!(set.manifest.host("db1").is_none());
        assert_eq!(set.graph.hosts().collect::<Vec<_>>(), vec!["web1"]);
        assert_eq!(
            set.manifest.host("web1").map(|h| h.ansible_aws_ssm_bucket_name.as_str()),
            Some("ssm-bucket")
        );
    }

    #[test]
    fn test_all_empty_plans_compile_to_nothing() {
        let set = ArtifactCompiler::new().compile(&[plan("idle", Platform::Debian, &[])]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_rendered_documents() {
        let set = ArtifactCompiler::new().compile(&[plan("web1", Platform::AmazonLinux, &["nginx"])]);
        let rendered = set.render().unwrap();

        let inventory: serde_yaml::Value = serde_yaml::from_str(&rendered.inventory).unwrap();
        let host = &inventory["all"]["hosts"]["web1"];
        assert_eq!(host["ansible_host"].as_str(), Some("i-web1"));
        assert_eq!(host["ansible_connection"].as_str(), Some("aws_ssm"));
        assert_eq!(host["ansible_aws_ssm_region"].as_str(), Some("ap-south-1"));
        assert_eq!(host["ansible_aws_ssm_bucket_name"].as_str(), Some("ssm-bucket"));

        let playbook: serde_yaml::Value = serde_yaml::from_str(&rendered.playbook).unwrap();
        let play = &playbook[0];
        assert_eq!(play["name"].as_str(), Some("Install software on web1"));
        assert_eq!(play["hosts"].as_str(), Some("web1"));
        assert_eq!(play["become"].as_bool(), Some(true));
        assert_eq!(play["tasks"][0]["name"].as_str(), Some("Install nginx"));
        assert_eq!(
            play["tasks"][0]["include_role"]["tasks_from"].as_str(),
            Some("amazonlinux.yml")
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let compiler = ArtifactCompiler::new();
        let a = compiler.compile(&[plan("web1", Platform::Ubuntu, &["nginx"])]);
        let b = compiler.compile(&[plan("web1", Platform::Ubuntu, &["nginx"])]);
        let c = compiler.compile(&[plan("web1", Platform::Ubuntu, &["redis"])]);

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_write_to_creates_both_files() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let set = ArtifactCompiler::new().compile(&[plan("web1", Platform::Ubuntu, &["nginx"])]);

        let paths = set
            .write_to(&temp.path().join("out"), "inventory.yml", "main.yml")
            .await
            .expect("write failed");

        let playbook = std::fs::read_to_string(&paths.playbook).expect("read");
        assert!(playbook.contains("tasks_from: ubuntu.yml"));
        assert!(paths.inventory.exists());
    }
}
