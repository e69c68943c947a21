//! CLI module for the rolewright tool.
//!
//! This module provides the command-line interface for planning and
//! applying role installations and for browsing the inventory.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
