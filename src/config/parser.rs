//! Configuration parser for loading run files.
//!
//! This module handles loading configuration from YAML files, `.env` files
//! and environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, Result, RolewrightError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{RunConfig, StoreBackend};

/// Configuration parser for loading run files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(RolewrightError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RolewrightError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<RunConfig> {
        debug!("Parsing YAML configuration");

        let config: RunConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source
                .map(|p| p.display().to_string())
                .or_else(|| e.location().map(|l| format!("line {}, column {}", l.line(), l.column())));
            RolewrightError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration with {} target(s)", config.targets.len());
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `ROLEWRIGHT_<SECTION>_<KEY>` (e.g., `ROLEWRIGHT_STORE_TABLE`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// holds an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<RunConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn apply_env_overrides(
        config: &mut RunConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(backend) = lookup("ROLEWRIGHT_STORE_BACKEND") {
            debug!("Overriding store.backend from environment");
            config.store.backend = match backend.trim().to_lowercase().as_str() {
                "local" => StoreBackend::Local,
                "dynamodb" => StoreBackend::Dynamodb,
                other => {
                    return Err(RolewrightError::Config(ConfigError::InvalidEnvVar {
                        name: String::from("ROLEWRIGHT_STORE_BACKEND"),
                        message: format!("unknown backend '{other}', expected local or dynamodb"),
                    }));
                }
            };
        }

        if let Some(table) = lookup("ROLEWRIGHT_STORE_TABLE") {
            debug!("Overriding store.table from environment");
            config.store.table = Some(table);
        }

        if let Some(region) = lookup("ROLEWRIGHT_STORE_REGION") {
            debug!("Overriding store.region from environment");
            config.store.region = Some(region);
        }

        if let Some(path) = lookup("ROLEWRIGHT_STORE_PATH") {
            debug!("Overriding store.path from environment");
            config.store.path = Some(path);
        }

        if let Some(roles_dir) = lookup("ROLEWRIGHT_ROLES_DIR") {
            debug!("Overriding catalog.roles_dir from environment");
            config.catalog.roles_dir = roles_dir;
        }

        if let Some(program) = lookup("ROLEWRIGHT_EXECUTOR") {
            debug!("Overriding executor.program from environment");
            config.executor.program = program;
        }

        if let Some(timeout) = lookup("ROLEWRIGHT_EXECUTOR_TIMEOUT_SECS") {
            debug!("Overriding executor.timeout_secs from environment");
            config.executor.timeout_secs = timeout.trim().parse().map_err(|e| {
                RolewrightError::Config(ConfigError::InvalidEnvVar {
                    name: String::from("ROLEWRIGHT_EXECUTOR_TIMEOUT_SECS"),
                    message: format!("'{timeout}' is not a number of seconds: {e}"),
                })
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                RolewrightError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["rolewright.yaml", "rolewright.yml", ".rolewright.yaml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(RolewrightError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
