//! Role discovery from a directory tree.
//!
//! A role is a directory `roles/<role>/` with a `tasks/` subdirectory. The
//! platforms it supports are the recognized stems of `tasks/*.yml`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{CapabilityError, Result, RolewrightError};
use crate::target::Platform;

/// One discoverable role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    /// Directory name of the role.
    pub role_name: String,
    /// Platforms that have a task file.
    pub supported_platforms: BTreeSet<Platform>,
}

impl CapabilityEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(role_name: impl Into<String>, platforms: impl IntoIterator<Item = Platform>) -> Self {
        Self {
            role_name: role_name.into(),
            supported_platforms: platforms.into_iter().collect(),
        }
    }

    /// Returns true if the role has a task file for `platform`.
    #[must_use]
    pub fn supports(&self, platform: Platform) -> bool {
        self.supported_platforms.contains(&platform)
    }

    /// Comma-separated supported platforms.
    #[must_use]
    pub fn platform_list(&self) -> String {
        self.supported_platforms
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The set of roles available to a run.
#[derive(Debug, Clone, Default)]
pub struct CapabilityCatalog {
    roles: BTreeMap<String, CapabilityEntry>,
    default_platform: Platform,
}

impl CapabilityCatalog {
    /// Builds a catalog from known entries. Entries without platforms are dropped.
    #[must_use]
    pub fn from_entries(
        entries: impl IntoIterator<Item = CapabilityEntry>,
        default_platform: Platform,
    ) -> Self {
        let roles = entries
            .into_iter()
            .filter(|e| !e.supported_platforms.is_empty())
            .map(|e| (e.role_name.clone(), e))
            .collect();

        Self {
            roles,
            default_platform,
        }
    }

    /// Discovers roles under `roles_dir`.
    ///
    /// A missing directory yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn discover(roles_dir: &Path, default_platform: Platform) -> Result<Self> {
        if !roles_dir.is_dir() {
            warn!("Roles directory not found: {}", roles_dir.display());
            return Ok(Self::from_entries(std::iter::empty(), default_platform));
        }

        info!("Discovering roles in: {}", roles_dir.display());

        let mut entries = Vec::new();
        for dir_entry in std::fs::read_dir(roles_dir).map_err(|e| {
            RolewrightError::internal(format!(
                "Cannot read roles directory {}: {e}",
                roles_dir.display()
            ))
        })? {
            let dir_entry = dir_entry?;
            let role_path = dir_entry.path();
            let Some(role_name) = dir_entry.file_name().to_str().map(str::to_string) else {
                debug!("Skipping non UTF-8 role directory: {}", role_path.display());
                continue;
            };

            if role_name.starts_with('.') || !role_path.join("tasks").is_dir() {
                continue;
            }

            let platforms = discover_platforms(&role_path.join("tasks"))?;
            if platforms.is_empty() {
                debug!("Role '{role_name}' has no platform task files, excluded");
                continue;
            }

            entries.push(CapabilityEntry {
                role_name,
                supported_platforms: platforms,
            });
        }

        let catalog = Self::from_entries(entries, default_platform);
        info!("Discovered {} role(s)", catalog.len());
        Ok(catalog)
    }

    /// Looks up a role.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&CapabilityEntry> {
        self.roles.get(role)
    }

    /// Checks that `role` exists and supports `platform`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` or `UnsupportedPlatform`.
    pub fn check(&self, role: &str, platform: Platform) -> std::result::Result<(), CapabilityError> {
        let entry = self.get(role).ok_or_else(|| CapabilityError::UnknownRole {
            role: role.to_string(),
        })?;

        if entry.supports(platform) {
            Ok(())
        } else {
            Err(CapabilityError::UnsupportedPlatform {
                role: role.to_string(),
                platform: platform.to_string(),
                supported: entry.platform_list(),
            })
        }
    }

    /// Maps a declared platform to a recognized one.
    ///
    /// Returns the platform and, when the input was not recognized, a
    /// diagnostic describing the fallback.
    #[must_use]
    pub fn normalize_platform(&self, raw: &str) -> (Platform, Option<String>) {
        Platform::parse(raw).map_or_else(
            || {
                (
                    self.default_platform,
                    Some(format!(
                        "Invalid platform '{}', defaulting to '{}'",
                        raw.trim(),
                        self.default_platform
                    )),
                )
            },
            |platform| (platform, None),
        )
    }

    /// Returns the fallback platform.
    #[must_use]
    pub const fn default_platform(&self) -> Platform {
        self.default_platform
    }

    /// Iterates over roles in name order.
    pub fn entries(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.roles.values()
    }

    /// Returns the number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns true if no roles were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

fn discover_platforms(tasks_dir: &Path) -> Result<BTreeSet<Platform>> {
    let mut platforms = BTreeSet::new();

    for file in std::fs::read_dir(tasks_dir)? {
        let path = file?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yml") {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        match Platform::parse(stem) {
            Some(platform) if stem == platform.as_str() => {
                platforms.insert(platform);
            }
            _ => debug!("Ignoring task file {}", path.display()),
        }
    }

    Ok(platforms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "---\n").expect("write");
    }

    #[test]
    fn test_discover_roles_and_platforms() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        touch(temp.path(), "nginx/tasks/ubuntu.yml");
        touch(temp.path(), "redis/tasks/ubuntu.yml");
        touch(temp.path(), "redis/tasks/centos.yml");
        touch(temp.path(), "redis/tasks/main.yml");
        touch(temp.path(), "empty/tasks/README.md");
        std::fs::create_dir_all(temp.path().join("notasks")).expect("mkdir");

        let catalog = CapabilityCatalog::discover(temp.path(), Platform::Ubuntu).unwrap();

        let names: Vec<&str> = catalog.entries().map(|e| e.role_name.as_str()).collect();
        assert_eq!(names, vec!["nginx", "redis"]);
        assert_eq!(
            catalog.get("redis").unwrap().supported_platforms,
            BTreeSet::from([Platform::Ubuntu, Platform::Centos])
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let catalog = CapabilityCatalog::discover(&temp.path().join("roles"), Platform::Ubuntu).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_check_reports_reason() {
        let catalog = CapabilityCatalog::from_entries(
            [CapabilityEntry::new("nginx", [Platform::Ubuntu])],
            Platform::Ubuntu,
        );

        assert!(catalog.check("nginx", Platform::Ubuntu).is_ok());
        assert!(matches!(
            catalog.check("nginx", Platform::Centos),
            Err(CapabilityError::UnsupportedPlatform { .. })
        ));
        assert!(matches!(
            catalog.check("mysql", Platform::Ubuntu),
            Err(CapabilityError::UnknownRole { .. })
        ));
    }

    #[test]
    fn test_normalize_platform_falls_back() {
        let catalog = CapabilityCatalog::from_entries(std::iter::empty(), Platform::Debian);

        assert_eq!(catalog.normalize_platform("CentOS"), (Platform::Centos, None));
        let (platform, warning) = catalog.normalize_platform("windows");
        assert_eq!(platform, catalog.default_platform());
        assert_eq!(platform, Platform::Debian);
        assert!(warning.unwrap().contains("windows"));
    }
}
