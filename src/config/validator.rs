//! Configuration validation for run files.
//!
//! Problems that make a whole run meaningless (no table for the DynamoDB
//! backend, a zero timeout) are errors. Problems with individual target
//! entries are warnings, since the run skips those entries and carries on.

use crate::error::{ConfigError, Result, RolewrightError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{
    CatalogConfig, ExecutorConfig, RunConfig, StoreBackend, StoreConfig, TargetDeclaration,
};
use crate::target::Platform;

/// Validator for run configurations.
#[derive(Debug)]
pub struct ConfigValidator {
    /// Platforms a new target may declare.
    known_platforms: HashSet<Platform>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator accepting every recognized platform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_platforms: Platform::ALL.into_iter().collect(),
        }
    }

    /// Restricts the platforms new targets may declare.
    #[must_use]
    pub fn with_platforms(platforms: impl IntoIterator<Item = Platform>) -> Self {
        Self {
            known_platforms: platforms.into_iter().collect(),
        }
    }

    /// Validates a run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &RunConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(RolewrightError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &RunConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_store(&config.store, &mut result);
        Self::validate_catalog(&config.catalog, &mut result);
        Self::validate_executor(&config.executor, &mut result);
        self.validate_targets(&config.targets, &mut result);

        result
    }

    /// Validates store configuration.
    fn validate_store(store: &StoreConfig, result: &mut ValidationResult) {
        match store.backend {
            StoreBackend::Dynamodb => {
                if store.table.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    result.errors.push(ValidationError {
                        field: String::from("store.table"),
                        message: String::from(
                            "DynamoDB table name is required when using the dynamodb backend",
                        ),
                    });
                }
                if store.path.is_some() {
                    result
                        .warnings
                        .push(String::from("store.path is ignored by the dynamodb backend"));
                }
            }
            StoreBackend::Local => {
                if store.table.is_some() {
                    result
                        .warnings
                        .push(String::from("store.table is ignored by the local backend"));
                }
            }
        }
    }

    /// Validates catalog configuration.
    fn validate_catalog(catalog: &CatalogConfig, result: &mut ValidationResult) {
        if catalog.roles_dir.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("catalog.roles_dir"),
                message: String::from("Roles directory cannot be empty"),
            });
        }
    }

    /// Validates executor configuration.
    fn validate_executor(executor: &ExecutorConfig, result: &mut ValidationResult) {
        if executor.program.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("executor.program"),
                message: String::from("Executor program cannot be empty"),
            });
        }

        if executor.timeout_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("executor.timeout_secs"),
                message: String::from("Executor timeout must be at least 1 second"),
            });
        }

        for (field, value) in [
            ("executor.inventory_file", &executor.inventory_file),
            ("executor.playbook_file", &executor.playbook_file),
        ] {
            if value.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: field.to_string(),
                    message: String::from("Artifact file name cannot be empty"),
                });
            }
        }

        if executor.inventory_file == executor.playbook_file {
            result.errors.push(ValidationError {
                field: String::from("executor.playbook_file"),
                message: String::from("Inventory and playbook must use different file names"),
            });
        }
    }

    /// Validates target declarations.
    fn validate_targets(&self, targets: &[TargetDeclaration], result: &mut ValidationResult) {
        if targets.is_empty() {
            result.warnings.push(String::from("No targets defined in configuration"));
            return;
        }

        let mut seen_names = HashSet::new();

        for (i, target) in targets.iter().enumerate() {
            let prefix = format!("targets[{i}]");
            let name = target.name().trim();

            if name.is_empty() {
                result
                    .warnings
                    .push(format!("{prefix}.name: empty name, this entry will be skipped"));
            } else if !seen_names.insert(name) {
                result.warnings.push(format!(
                    "{prefix}.name: duplicate target '{name}', only the first entry is used"
                ));
            }

            if target.software().as_csv().trim().is_empty() {
                result
                    .warnings
                    .push(format!("{prefix}.software: no software requested for '{name}'"));
            }

            if let TargetDeclaration::New(new) = target {
                if new.instance_id.trim().is_empty() || new.region.trim().is_empty() {
                    result.warnings.push(format!(
                        "{prefix}: new target '{name}' needs instance_id and region, this entry will be skipped"
                    ));
                }
                let known = Platform::parse(&new.platform)
                    .is_some_and(|p| self.known_platforms.contains(&p));
                if !new.platform.trim().is_empty() && !known {
                    result.warnings.push(format!(
                        "{prefix}.platform: unknown platform '{}', the default platform will be used",
                        new.platform
                    ));
                }
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
