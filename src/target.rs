//! Resolved target descriptors.
//!
//! A [`TargetDescriptor`] is the per-run view of one machine: either built
//! from a NEW declaration or loaded from the inventory for an EXISTING one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system family of a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Ubuntu.
    #[default]
    Ubuntu,
    /// `CentOS`.
    Centos,
    /// Debian.
    Debian,
    /// Amazon Linux.
    #[serde(rename = "amazonlinux")]
    AmazonLinux,
}

impl Platform {
    /// All recognized platforms.
    pub const ALL: [Self; 4] = [Self::Ubuntu, Self::Centos, Self::Debian, Self::AmazonLinux];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Centos => "centos",
            Self::Debian => "debian",
            Self::AmazonLinux => "amazonlinux",
        }
    }

    /// Parses a platform name, ignoring case and surrounding whitespace.
    ///
    /// Returns `None` for anything that is not a recognized platform.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let wanted = input.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == wanted)
    }

    /// Name of the task file a role provides for this platform.
    #[must_use]
    pub fn task_file(self) -> String {
        format!("{}.yml", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a target was declared new or looked up from the inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// First encounter; a SERVER record will be written.
    New,
    /// Already present in the inventory.
    Existing,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Existing => f.write_str("existing"),
        }
    }
}

/// A fully resolved target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Cloud instance identifier, unique and immutable.
    pub instance_id: String,
    /// Human label, unique among the targets of a run.
    pub name: String,
    /// Cloud region.
    pub region: String,
    /// Operating-system family.
    pub platform: Platform,
    /// Storage bucket used by the remote-session transport.
    pub transport_bucket: Option<String>,
    /// Where the descriptor came from.
    pub origin: Origin,
}

impl TargetDescriptor {
    /// Returns the transport bucket when it is set and non-blank.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.transport_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// Returns true if the target was declared new in this run.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.origin == Origin::New
    }
}
