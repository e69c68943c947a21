//! Configuration module for the rolewright system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `rolewright.yaml`
//! - Environment and `.env` overrides
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    CatalogConfig, ExecutorConfig, ExistingTarget, NewTarget, RunConfig, SoftwareRequest,
    StoreBackend, StoreConfig, TargetDeclaration,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
