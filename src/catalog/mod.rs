//! Capability catalog for the rolewright system.
//!
//! Discovers which roles exist and which platforms each of them supports.

mod roles;

pub use roles::{CapabilityCatalog, CapabilityEntry};
