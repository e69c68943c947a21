//! Artifact generation for the rolewright system.
//!
//! Compiles install plans into a host inventory and a task graph. Every
//! inventory host has exactly one play in the graph and vice versa.

mod manifest;
mod graph;
mod compiler;

pub use manifest::{CONNECTION, HostVars, InventoryManifest};
pub use graph::{IncludeRole, Play, Task, TaskGraph};
pub use compiler::{ArtifactCompiler, ArtifactPaths, ArtifactSet, RenderedArtifacts};
