//! Error types for the rolewright system.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, target resolution, capability checks, inventory storage,
//! artifact generation and execution of the external playbook runner.
//!
//! Most of these errors are recoverable. Resolution, capability and store
//! failures are carried as values inside run reports so that one bad entry
//! never aborts the batch; only configuration and bootstrap problems are
//! propagated as `Err`.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the rolewright system.
#[derive(Debug, Error)]
pub enum RolewrightError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Target resolution errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Capability catalog errors.
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Inventory store errors.
    #[error("Inventory store error: {0}")]
    Store(#[from] StoreError),

    /// Artifact generation errors.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// External executor errors.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing or malformed.
    #[error("Invalid environment variable {name}: {message}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Errors raised while resolving declared targets.
///
/// Every variant is recoverable: the offending entry is skipped and the
/// rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileError {
    /// A declared field is missing or malformed.
    #[error("Invalid {field} for target '{name}': {message}")]
    InvalidField {
        /// Target name as declared (may be empty).
        name: String,
        /// Offending field.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// An existing target was not found in the inventory.
    #[error("Server '{name}' not found in inventory")]
    NotFound {
        /// Requested server name.
        name: String,
    },

    /// An existing target was requested but the inventory holds no servers.
    #[error("No existing servers found in inventory, declare '{name}' as new instead")]
    EmptyInventory {
        /// Requested server name.
        name: String,
    },

    /// The same target was declared more than once in a batch.
    #[error("Target '{name}' is declared more than once (duplicate {field})")]
    DuplicateTarget {
        /// Target name.
        name: String,
        /// Field that collided (`name` or `instance_id`).
        field: String,
    },

    /// A new target collides with a server already stored in the inventory.
    #[error(
        "Target '{name}' collides with stored server '{stored_name}' ({stored_id}) on {field}, declare it as existing instead"
    )]
    AlreadyRegistered {
        /// Declared target name.
        name: String,
        /// Field that collided (`name` or `instance_id`).
        field: String,
        /// Name of the stored server.
        stored_name: String,
        /// Instance id of the stored server.
        stored_id: String,
    },

    /// A target has software to install but no transport bucket.
    #[error("Target '{name}' has software to install but no transport bucket")]
    MissingBucket {
        /// Target name.
        name: String,
    },

    /// The inventory could not be consulted for this entry.
    #[error("Cannot look up '{name}': {message}")]
    StoreUnavailable {
        /// Requested server name.
        name: String,
        /// Underlying store failure.
        message: String,
    },
}

/// Capability catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityError {
    /// The requested role does not exist in the catalog.
    #[error("Unknown role '{role}'")]
    UnknownRole {
        /// Requested role.
        role: String,
    },

    /// The role exists but has no variant for the target platform.
    #[error("Role '{role}' does not support platform '{platform}' (supported: {supported})")]
    UnsupportedPlatform {
        /// Requested role.
        role: String,
        /// Target platform.
        platform: String,
        /// Comma-separated supported platforms.
        supported: String,
    },
}

/// Inventory store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend rejected or failed a request.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// Stored data could not be read back.
    #[error("Inventory is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Inventory serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// A stored row does not describe a known record kind.
    #[error("Invalid inventory record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },
}

/// Artifact generation errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// An artifact could not be serialized.
    #[error("Failed to render {artifact}: {message}")]
    Serialization {
        /// Which artifact failed.
        artifact: String,
        /// Serializer message.
        message: String,
    },

    /// An artifact could not be written to disk.
    #[error("Failed to write {path}: {message}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// IO message.
        message: String,
    },
}

/// External executor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The executor binary is not installed.
    #[error("{program} command not found, please install it")]
    ToolMissing {
        /// Program that was invoked.
        program: String,
    },

    /// The executor did not finish in time.
    #[error("Execution timed out after {timeout_secs} seconds")]
    Timeout {
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// The executor exited with a non-zero status.
    #[error("Executor exited with status {code:?}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// The executor could not be started or awaited.
    #[error("Failed to run executor: {message}")]
    Spawn {
        /// Description of the failure.
        message: String,
    },

    /// Artifacts could not be prepared so the executor never ran.
    #[error("Artifacts unavailable: {message}")]
    NotStarted {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for rolewright operations.
pub type Result<T> = std::result::Result<T, RolewrightError>;

impl RolewrightError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ReconcileError {
    /// Creates an invalid-field error.
    #[must_use]
    pub fn invalid_field(
        name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            name: name.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true for lookup failures against the inventory.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::EmptyInventory { .. } | Self::StoreUnavailable { .. }
        )
    }
}

impl StoreError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates an invalid-record error with the given message.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}
