//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::catalog::CapabilityCatalog;
use crate::inventory::{InstallationStatus, ServerRecord, SoftwareRecord, format_timestamp};
use crate::runner::RunOutcome;
use crate::workflow::{RunReport, RunStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Role row for table display.
#[derive(Tabled)]
struct RoleRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Platforms")]
    platforms: String,
}

/// Server row for table display.
#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Instance")]
    instance_id: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "OS")]
    os_type: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

/// Installation row for table display.
#[derive(Tabled)]
struct SoftwareRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Software")]
    software: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Installed")]
    installed: String,
}

/// Target row for table display.
#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "Target")]
    name: String,
    #[tabled(rename = "Instance")]
    instance_id: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Roles")]
    roles: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true for JSON output.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Formats the capability catalog.
    #[must_use]
    pub fn format_roles(&self, catalog: &CapabilityCatalog) -> String {
        let rows: Vec<RoleRow> = catalog
            .entries()
            .map(|entry| RoleRow {
                role: entry.role_name.clone(),
                platforms: entry.platform_list(),
            })
            .collect();

        match self.format {
            OutputFormat::Json => {
                let json: BTreeMap<&str, Vec<&str>> = catalog
                    .entries()
                    .map(|entry| {
                        (
                            entry.role_name.as_str(),
                            entry.supported_platforms.iter().map(|p| p.as_str()).collect(),
                        )
                    })
                    .collect();
                to_json(&json)
            }
            OutputFormat::Text if rows.is_empty() => {
                format!("{} No roles found.\n", "⚠".yellow())
            }
            OutputFormat::Text => format!("{}\n", Table::new(rows)),
        }
    }

    /// Formats stored servers, sorted by name.
    #[must_use]
    pub fn format_servers(&self, servers: &[ServerRecord]) -> String {
        let mut sorted: Vec<&ServerRecord> = servers.iter().collect();
        sorted.sort_by(|a, b| a.server_name.cmp(&b.server_name));

        match self.format {
            OutputFormat::Json => to_json(&sorted),
            OutputFormat::Text if sorted.is_empty() => "No servers found in the inventory.\n".to_string(),
            OutputFormat::Text => {
                let rows: Vec<ServerRow> = sorted
                    .iter()
                    .map(|s| ServerRow {
                        name: s.server_name.clone(),
                        instance_id: s.instance_id.clone(),
                        region: s.region.clone(),
                        os_type: s.os_type.clone(),
                        created_at: s.created_at.map_or_else(|| "-".to_string(), format_timestamp),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats installation statuses, labelled with server names when known.
    #[must_use]
    pub fn format_status(&self, servers: &[ServerRecord], software: &[SoftwareRecord]) -> String {
        if self.is_json() {
            return to_json(&software);
        }
        if software.is_empty() {
            return "No installation records found.\n".to_string();
        }

        let mut names: BTreeMap<&str, &str> = BTreeMap::new();
        for server in servers {
            names
                .entry(server.instance_id.as_str())
                .or_insert(server.server_name.as_str());
        }

        let mut rows: Vec<SoftwareRow> = software
            .iter()
            .map(|sw| SoftwareRow {
                server: names
                    .get(sw.instance_id.as_str())
                    .map_or_else(|| sw.instance_id.clone(), ToString::to_string),
                software: sw.software_name.clone(),
                status: Self::format_installation(sw.installation_status),
                installed: format_timestamp(sw.installed_date),
            })
            .collect();
        rows.sort_by(|a, b| (&a.server, &a.software).cmp(&(&b.server, &b.software)));

        let failed = software
            .iter()
            .filter(|sw| sw.installation_status == InstallationStatus::Failed)
            .count();

        format!(
            "{}\n\n{} record(s), {} failed\n",
            Table::new(rows),
            software.len(),
            failed
        )
    }

    /// Formats a run report.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a run report as text.
    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let rows: Vec<TargetRow> = report
            .targets
            .iter()
            .map(|t| TargetRow {
                name: t.name.clone(),
                instance_id: t.instance_id.clone(),
                origin: t.origin.to_string(),
                platform: t.platform.to_string(),
                roles: if t.roles.is_empty() {
                    "-".dimmed().to_string()
                } else {
                    t.roles.join(", ")
                },
            })
            .collect();

        if !rows.is_empty() {
            let _ = writeln!(output, "\nTargets\n{}", Table::new(rows));
        }

        Self::write_diagnostics(&mut output, report);

        match report.status {
            RunStatus::NothingToDo => {
                let _ = writeln!(
                    output,
                    "\n{} No valid software selected for any target. Nothing to do.",
                    "✓".green()
                );
            }
            RunStatus::Planned => {
                if let Some(artifacts) = &report.artifacts {
                    let _ = write!(
                        output,
                        "\n# inventory\n{}\n# playbook\n{}",
                        artifacts.inventory, artifacts.playbook
                    );
                }
                if let Some(fingerprint) = &report.fingerprint {
                    let _ = writeln!(output, "\nFingerprint: {}", &fingerprint[..12.min(fingerprint.len())]);
                }
            }
            RunStatus::Completed => {
                let outcome = report.outcome.map_or_else(String::new, Self::format_outcome);
                let _ = writeln!(output, "\nPlaybook execution: {outcome}");
                if let Some(error) = report.execution.as_ref().and_then(|e| e.error.as_ref()) {
                    let _ = writeln!(output, "   {error}");
                }
                let _ = writeln!(
                    output,
                    "Records: {} written, {} failed",
                    report.records.written, report.records.failed
                );
            }
        }

        output
    }

    /// Writes the diagnostics section, if any.
    fn write_diagnostics(output: &mut String, report: &RunReport) {
        let diagnostics = &report.diagnostics;
        if diagnostics.is_empty() {
            return;
        }

        let _ = writeln!(output, "\n{} Diagnostics:", "⚠".yellow());
        for skipped in &diagnostics.skipped {
            let _ = writeln!(output, "   - skipped #{} {}: {}", skipped.index + 1, skipped.name, skipped.reason);
        }
        for rejected in &diagnostics.rejected {
            let _ = writeln!(output, "   - {}: {}", rejected.target, rejected.reason);
        }
        for blocked in &diagnostics.blocked {
            let _ = writeln!(output, "   - {}", blocked.reason);
        }
        for warning in &diagnostics.warnings {
            let _ = writeln!(output, "   - {warning}");
        }
    }

    /// Formats an installation status with color.
    fn format_installation(status: InstallationStatus) -> String {
        match status {
            InstallationStatus::Success => "success".green().to_string(),
            InstallationStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Formats a run outcome with color.
    fn format_outcome(outcome: RunOutcome) -> String {
        match outcome {
            RunOutcome::Success => outcome.to_string().green().to_string(),
            RunOutcome::Failure | RunOutcome::ToolMissing => outcome.to_string().red().to_string(),
            RunOutcome::Timeout => outcome.to_string().yellow().to_string(),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
