//! Inventory record types.
//!
//! Records are keyed by `(instance_id, record_type)`. A `SERVER` row holds the
//! identity snapshot of a machine; a `SOFTWARE#<role>` row holds the latest
//! installation outcome of one role on that machine.
//!
//! Every backend stores records as flat string attribute maps so that the
//! local JSON file and the DynamoDB table share one row schema.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StoreError;

/// Record type of identity snapshots.
pub const SERVER_RECORD_TYPE: &str = "SERVER";

/// Prefix of per-role installation records.
pub const SOFTWARE_RECORD_PREFIX: &str = "SOFTWARE#";

/// Timestamp format used for every stored date.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A stored row: attribute name to string value.
pub type Attributes = BTreeMap<String, String>;

/// Formats a timestamp the way it is stored.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
///
/// # Errors
///
/// Returns an error if the value does not match [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::invalid_record(format!("bad timestamp '{value}': {e}")))
}

/// The second half of a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// Identity snapshot.
    Server,
    /// Installation status of the named role.
    Software(String),
}

impl RecordKind {
    /// Parses a stored `record_type` value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown record types.
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        if value == SERVER_RECORD_TYPE {
            return Ok(Self::Server);
        }
        match value.strip_prefix(SOFTWARE_RECORD_PREFIX) {
            Some(role) if !role.is_empty() => Ok(Self::Software(role.to_string())),
            _ => Err(StoreError::invalid_record(format!(
                "unknown record_type '{value}'"
            ))),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str(SERVER_RECORD_TYPE),
            Self::Software(role) => write!(f, "{SOFTWARE_RECORD_PREFIX}{role}"),
        }
    }
}

/// Unique key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Partition key.
    pub instance_id: String,
    /// Sort key.
    pub kind: RecordKind,
}

/// Outcome of installing one role on one machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallationStatus {
    /// The run that touched this role succeeded.
    Success,
    /// The run that touched this role did not succeed.
    Failed,
}

impl InstallationStatus {
    /// Returns the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored value, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error for anything but `success` or `failed`.
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::invalid_record(format!(
                "unknown installation_status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity snapshot of a machine, written once on first encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerRecord {
    /// Cloud instance identifier.
    pub instance_id: String,
    /// Human label.
    pub server_name: String,
    /// Cloud region.
    pub region: String,
    /// Platform name as stored; normalized on read by the reconciler.
    pub os_type: String,
    /// When the snapshot was written, absent on rows from older writers.
    pub created_at: Option<DateTime<Utc>>,
}

/// Latest installation outcome of one role on one machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoftwareRecord {
    /// Cloud instance identifier.
    pub instance_id: String,
    /// Role name.
    pub software_name: String,
    /// Outcome of the last run that touched this role.
    pub installation_status: InstallationStatus,
    /// When the outcome was recorded.
    pub installed_date: DateTime<Utc>,
    /// Run that recorded the outcome, absent on rows from older writers.
    pub run_id: Option<String>,
}

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRecord {
    /// `SERVER` row.
    Server(ServerRecord),
    /// `SOFTWARE#<role>` row.
    Software(SoftwareRecord),
}

impl InventoryRecord {
    /// Returns the partition key.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        match self {
            Self::Server(s) => &s.instance_id,
            Self::Software(s) => &s.instance_id,
        }
    }

    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Server(_) => RecordKind::Server,
            Self::Software(s) => RecordKind::Software(s.software_name.clone()),
        }
    }

    /// Returns the full key.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            instance_id: self.instance_id().to_string(),
            kind: self.kind(),
        }
    }

    /// Flattens the record into a stored row.
    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        let mut row = Attributes::new();
        row.insert("instance_id".into(), self.instance_id().to_string());
        row.insert("record_type".into(), self.kind().to_string());

        match self {
            Self::Server(s) => {
                row.insert("server_name".into(), s.server_name.clone());
                row.insert("region".into(), s.region.clone());
                row.insert("os_type".into(), s.os_type.clone());
                if let Some(created_at) = s.created_at {
                    row.insert("created_at".into(), format_timestamp(created_at));
                }
            }
            Self::Software(s) => {
                row.insert("software_name".into(), s.software_name.clone());
                row.insert(
                    "installation_status".into(),
                    s.installation_status.as_str().to_string(),
                );
                row.insert("installed_date".into(), format_timestamp(s.installed_date));
                if let Some(run_id) = &s.run_id {
                    row.insert("run_id".into(), run_id.clone());
                }
            }
        }

        row
    }

    /// Rebuilds a record from a stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if a required attribute is missing or malformed.
    pub fn from_attributes(row: &Attributes) -> Result<Self, StoreError> {
        let instance_id = required(row, "instance_id")?;
        let kind = RecordKind::parse(&required(row, "record_type")?)?;

        match kind {
            RecordKind::Server => Ok(Self::Server(ServerRecord {
                instance_id,
                server_name: required(row, "server_name")?,
                region: row.get("region").cloned().unwrap_or_default(),
                os_type: row.get("os_type").cloned().unwrap_or_default(),
                created_at: row
                    .get("created_at")
                    .map(String::as_str)
                    .map(parse_timestamp)
                    .transpose()?,
            })),
            RecordKind::Software(role) => Ok(Self::Software(SoftwareRecord {
                instance_id,
                software_name: row.get("software_name").cloned().unwrap_or(role),
                installation_status: InstallationStatus::parse(&required(
                    row,
                    "installation_status",
                )?)?,
                installed_date: parse_timestamp(&required(row, "installed_date")?)?,
                run_id: row.get("run_id").cloned(),
            })),
        }
    }
}

fn required(row: &Attributes, name: &str) -> Result<String, StoreError> {
    row.get(name)
        .cloned()
        .ok_or_else(|| StoreError::invalid_record(format!("missing attribute '{name}'")))
}

/// Which rows a scan returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Every row.
    All,
    /// Rows whose `record_type` equals the value.
    RecordType(String),
    /// Rows whose `record_type` starts with the value.
    RecordTypePrefix(String),
}

impl ScanFilter {
    /// Matches identity snapshots only.
    #[must_use]
    pub fn servers() -> Self {
        Self::RecordType(SERVER_RECORD_TYPE.to_string())
    }

    /// Matches installation records only.
    #[must_use]
    pub fn software() -> Self {
        Self::RecordTypePrefix(SOFTWARE_RECORD_PREFIX.to_string())
    }

    /// Returns true if a row with this `record_type` passes the filter.
    #[must_use]
    pub fn matches(&self, record_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::RecordType(wanted) => record_type == wanted,
            Self::RecordTypePrefix(prefix) => record_type.starts_with(prefix.as_str()),
        }
    }
}
