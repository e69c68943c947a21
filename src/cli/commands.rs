//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rolewright - Ansible role installation over SSM with a recorded inventory.
#[derive(Parser, Debug)]
#[command(name = "rolewright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the run file.
    #[arg(short, long, global = true, env = "ROLEWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new rolewright project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the run file.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List discovered roles and their platforms.
    Roles,

    /// List servers stored in the inventory.
    Servers,

    /// Show recorded installation statuses.
    Status {
        /// Only show this server.
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Resolve targets and show the artifacts without executing.
    Plan,

    /// Install the requested software.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Ask for transport buckets that the run file does not declare.
        #[arg(long)]
        prompt_buckets: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from(["rolewright", "apply", "--yes", "--prompt-buckets"])
            .expect("parse failed");
        assert!(matches!(
            cli.command,
            Commands::Apply {
                yes: true,
                prompt_buckets: true
            }
        ));
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rolewright",
            "status",
            "--server",
            "web1",
            "--output",
            "json",
            "-c",
            "run.yaml",
        ])
        .expect("parse failed");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("run.yaml")));
        assert!(matches!(cli.command, Commands::Status { server: Some(ref s) } if s == "web1"));
    }
}
