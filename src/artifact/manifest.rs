//! Host inventory artifact.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Connection plugin used for every host.
pub const CONNECTION: &str = "aws_ssm";

/// Connection variables of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostVars {
    /// Instance identifier the session connects to.
    pub ansible_host: String,
    /// Connection plugin.
    pub ansible_connection: String,
    /// Region of the instance.
    pub ansible_aws_ssm_region: String,
    /// Bucket used to transfer files.
    pub ansible_aws_ssm_bucket_name: String,
}

/// Host inventory, one entry per target in plan order.
///
/// Serialized as `{all: {hosts: {<name>: <vars>}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryManifest {
    hosts: Vec<(String, HostVars)>,
}

impl InventoryManifest {
    /// Appends a host.
    pub fn push(&mut self, name: impl Into<String>, vars: HostVars) {
        self.hosts.push((name.into(), vars));
    }

    /// Host names in order.
    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(|(name, _)| name.as_str())
    }

    /// Looks up a host.
    #[must_use]
    pub fn host(&self, name: &str) -> Option<&HostVars> {
        self.hosts.iter().find(|(n, _)| n == name).map(|(_, vars)| vars)
    }

    /// Number of hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if there are no hosts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

struct Hosts<'a>(&'a [(String, HostVars)]);

impl Serialize for Hosts<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, vars)| (name, vars)))
    }
}

struct Group<'a>(&'a [(String, HostVars)]);

impl Serialize for Group<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("hosts", &Hosts(self.0))?;
        map.end()
    }
}

impl Serialize for InventoryManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("all", &Group(&self.hosts))?;
        map.end()
    }
}
