//! Configuration specification types for the run file.
//!
//! This module defines all the structs that map to the `rolewright.yaml` file:
//! where the inventory lives, where roles are discovered, how the executor is
//! invoked, and which targets a run should configure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::target::Platform;

/// The root configuration structure for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunConfig {
    /// Inventory backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Capability catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Executor configuration.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Targets to configure in this run.
    #[serde(default)]
    pub targets: Vec<TargetDeclaration>,
}

/// Inventory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Backend type (local or dynamodb).
    #[serde(default)]
    pub backend: StoreBackend,
    /// Local inventory file path (for local backend).
    #[serde(default)]
    pub path: Option<String>,
    /// DynamoDB table name (required for dynamodb backend).
    #[serde(default)]
    pub table: Option<String>,
    /// AWS region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Inventory backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local JSON file.
    #[default]
    Local,
    /// AWS DynamoDB table.
    Dynamodb,
}

/// Capability catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Directory holding `<role>/tasks/<platform>.yml` files.
    #[serde(default = "default_roles_dir")]
    pub roles_dir: String,
    /// Platform used when a declared platform is not recognized.
    #[serde(default)]
    pub default_platform: Platform,
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Program invoked with `-i <inventory> <playbook>`.
    #[serde(default = "default_program")]
    pub program: String,
    /// Maximum run time in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory the artifacts are written to and the executor runs in.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    /// File name of the host inventory artifact.
    #[serde(default = "default_inventory_file")]
    pub inventory_file: String,
    /// File name of the task graph artifact.
    #[serde(default = "default_playbook_file")]
    pub playbook_file: String,
}

/// A target as declared by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum TargetDeclaration {
    /// A machine seen for the first time.
    New(NewTarget),
    /// A machine already recorded in the inventory.
    Existing(ExistingTarget),
}

/// Declaration of a new machine; every identity field comes from the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct NewTarget {
    /// Human label.
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    /// Cloud instance identifier.
    #[validate(length(min = 1, message = "must not be empty"))]
    pub instance_id: String,
    /// Cloud region.
    #[validate(length(min = 1, message = "must not be empty"))]
    pub region: String,
    /// Platform name; unrecognized values fall back to the default platform.
    #[serde(default)]
    pub platform: String,
    /// Transport bucket for the remote session.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Requested roles.
    #[serde(default)]
    pub software: SoftwareRequest,
}

/// Declaration of a known machine, looked up by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingTarget {
    /// Name of the stored server.
    pub name: String,
    /// Transport bucket for the remote session.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Requested roles.
    #[serde(default)]
    pub software: SoftwareRequest,
}

/// Requested roles, either comma-separated or as a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SoftwareRequest {
    /// `"nginx, redis"`.
    Csv(String),
    /// `[nginx, redis]`.
    List(Vec<String>),
}

impl Default for SoftwareRequest {
    fn default() -> Self {
        Self::Csv(String::new())
    }
}

impl SoftwareRequest {
    /// Returns the request as one comma-separated string.
    #[must_use]
    pub fn as_csv(&self) -> String {
        match self {
            Self::Csv(raw) => raw.clone(),
            Self::List(items) => items.join(","),
        }
    }
}

impl From<&str> for SoftwareRequest {
    fn from(raw: &str) -> Self {
        Self::Csv(raw.to_string())
    }
}

// Default value functions

fn default_roles_dir() -> String {
    String::from("roles")
}

fn default_program() -> String {
    String::from("ansible-playbook")
}

const fn default_timeout_secs() -> u64 {
    1800
}

fn default_artifact_dir() -> String {
    String::from(".")
}

fn default_inventory_file() -> String {
    String::from("inventory.yml")
}

fn default_playbook_file() -> String {
    String::from("main.yml")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            roles_dir: default_roles_dir(),
            default_platform: Platform::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_timeout_secs(),
            artifact_dir: default_artifact_dir(),
            inventory_file: default_inventory_file(),
            playbook_file: default_playbook_file(),
        }
    }
}

impl TargetDeclaration {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::New(t) => &t.name,
            Self::Existing(t) => &t.name,
        }
    }

    /// Returns the declared transport bucket.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        match self {
            Self::New(t) => t.bucket.as_deref(),
            Self::Existing(t) => t.bucket.as_deref(),
        }
    }

    /// Returns the requested roles.
    #[must_use]
    pub const fn software(&self) -> &SoftwareRequest {
        match self {
            Self::New(t) => &t.software,
            Self::Existing(t) => &t.software,
        }
    }
}

impl RunConfig {
    /// Resolves a configured path against the run file's directory.
    #[must_use]
    pub fn resolve_path(base: Option<&Path>, configured: &str) -> PathBuf {
        let path = PathBuf::from(configured);
        match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// Returns the declared target names in order.
    #[must_use]
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(TargetDeclaration::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_request_forms() {
        let csv: SoftwareRequest = serde_yaml::from_str("\"nginx, redis\"").unwrap();
        assert_eq!(csv.as_csv(), "nginx, redis");

        let list: SoftwareRequest = serde_yaml::from_str("[nginx, redis]").unwrap();
        assert_eq!(list.as_csv(), "nginx,redis");
    }

    #[test]
    fn test_target_declaration_tagging() {
        let yaml = r"
- origin: new
  name: web1
  instance_id: i-1
  region: ap-south-1
  software: nginx
- origin: existing
  name: db1
";
        let targets: Vec<TargetDeclaration> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(&targets[0], TargetDeclaration::New(t) if t.platform.is_empty()));
        assert!(matches!(&targets[1], TargetDeclaration::Existing(t) if t.bucket.is_none()));
        assert_eq!(targets[1].software().as_csv(), "");
    }

    #[test]
    fn test_new_target_validation() {
        let target = NewTarget {
            name: String::from("web1"),
            instance_id: String::new(),
            region: String::from("ap-south-1"),
            platform: String::new(),
            bucket: None,
            software: SoftwareRequest::default(),
        };
        let errors = target.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("instance_id"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = Path::new("/srv/run");
        assert_eq!(
            RunConfig::resolve_path(Some(base), "roles"),
            PathBuf::from("/srv/run/roles")
        );
        assert_eq!(
            RunConfig::resolve_path(Some(base), "/etc/roles"),
            PathBuf::from("/etc/roles")
        );
    }
}
