// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Rolewright
//!
//! Installs Ansible roles on machines reached over AWS SSM and keeps a
//! persistent inventory of what was installed where.
//!
//! ## Overview
//!
//! A run takes a list of declared targets from `rolewright.yaml` and:
//!
//! 1. **Reconciles** each declaration against the inventory. New machines are
//!    taken as declared, existing ones are looked up by name.
//! 2. **Plans** the requested software against the roles that exist on disk
//!    and the platforms each role supports.
//! 3. **Compiles** a host inventory and a playbook for the targets that have
//!    something to install.
//! 4. **Executes** `ansible-playbook` once, with a timeout.
//! 5. **Records** one installation status per target and role.
//!
//! Problems with a single target never abort the run. They are collected as
//! diagnostics in the [`RunReport`].
//!
//! ## Modules
//!
//! - [`config`]: Run file parsing and validation
//! - [`inventory`]: Inventory storage backends (local, DynamoDB, memory)
//! - [`catalog`]: Role discovery
//! - [`reconciler`]: Target resolution against the inventory
//! - [`planner`]: Software planning and transport buckets
//! - [`artifact`]: Inventory and playbook generation
//! - [`runner`]: Executor invocation
//! - [`recorder`]: Outcome recording
//! - [`workflow`]: End-to-end run driver
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! store:
//!   backend: dynamodb
//!   table: ansible-inventory
//!   region: ap-south-1
//!
//! targets:
//!   - origin: new
//!     name: web1
//!     instance_id: i-0123456789abcdef0
//!     region: ap-south-1
//!     platform: ubuntu
//!     bucket: my-ssm-bucket
//!     software: "nginx, redis"
//!   - origin: existing
//!     name: db1
//!     software: [redis]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod artifact;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod planner;
pub mod reconciler;
pub mod recorder;
pub mod runner;
pub mod target;
pub mod workflow;

// ============================================================================
// Re-exports
// ============================================================================

pub use artifact::{ArtifactCompiler, ArtifactSet, InventoryManifest, TaskGraph};
pub use catalog::{CapabilityCatalog, CapabilityEntry};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, RunConfig, TargetDeclaration};
pub use error::{Result, RolewrightError};
pub use inventory::{
    DynamoInventoryStore, InventoryRecord, InventoryStore, LocalInventoryStore,
    MemoryInventoryStore,
};
pub use planner::{BucketSource, InstallPlan, Planning, SoftwarePlanner};
pub use reconciler::{RecordReconciler, Resolution};
pub use recorder::{RecordSummary, StatusRecorder};
pub use runner::{ExecutionReport, ExecutionRunner, RunOutcome};
pub use target::{Origin, Platform, TargetDescriptor};
pub use workflow::{RunMode, RunReport, RunRequest, RunStatus, Workflow};
