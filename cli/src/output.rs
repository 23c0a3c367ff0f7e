// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Report rendering: a human table grouped by step, or JSON.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use std::fmt::Write;

use stackup_core::domain::report::{PhaseOutcome, ProvisioningReport, ReportStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

pub fn render_report(report: &ProvisioningReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report")
        }
        OutputFormat::Human => Ok(render_human(report)),
    }
}

fn render_human(report: &ProvisioningReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", report.phase.to_string().bold(), report.project.dimmed());

    let kind_width = report.entries.iter().map(|e| e.kind.len()).max().unwrap_or(0);
    let name_width = report.entries.iter().map(|e| e.name.len()).max().unwrap_or(0);

    let mut current_step = None;
    for entry in &report.entries {
        if current_step != Some(entry.step) {
            current_step = Some(entry.step);
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", entry.step.to_string().bold());
        }
        let _ = write!(
            out,
            "  {:kind_width$}  {:name_width$}  {}",
            entry.kind,
            entry.name,
            format_status(&entry.status),
        );
        if let Some(id) = &entry.id {
            let _ = write!(out, "  {}", id.dimmed());
        }
        if let Some(detail) = entry.status.detail() {
            let _ = write!(out, "  ({})", detail);
        }
        let _ = writeln!(out);
    }

    if let Some(fatal) = &report.fatal {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", "✗".red(), fatal.message.red());
    }

    let _ = writeln!(out);
    let _ = write!(out, "{}", format_outcome(report));
    out
}

fn format_status(status: &ReportStatus) -> ColoredString {
    let label = status.label();
    match status {
        ReportStatus::Created | ReportStatus::Published | ReportStatus::Updated => label.green(),
        ReportStatus::Reused | ReportStatus::Resolved => label.normal(),
        ReportStatus::Pending | ReportStatus::Deferred(_) | ReportStatus::Degraded(_) => label.yellow(),
        ReportStatus::Skipped(_) | ReportStatus::Failed(_) => label.red(),
    }
}

fn format_outcome(report: &ProvisioningReport) -> ColoredString {
    match report.outcome() {
        PhaseOutcome::Complete => "✓ Complete".green(),
        PhaseOutcome::Partial => format!(
            "… {} resource(s) not ready yet; re-run this phase later",
            report.pending().count()
        )
        .yellow(),
        PhaseOutcome::CompletedWithFailures => {
            format!("✗ Completed with {} failure(s)", report.failed().count()).red()
        }
        PhaseOutcome::Aborted => "✗ Aborted".red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stackup_core::domain::report::{Phase, ReportEntry, Step};

    fn report() -> ProvisioningReport {
        ProvisioningReport {
            phase: Phase::NetworkTier,
            project: "demo".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            entries: vec![
                ReportEntry {
                    step: Step::ManagedResources,
                    kind: "database-instance".to_string(),
                    name: "demo-db".to_string(),
                    id: Some("db-1".to_string()),
                    status: ReportStatus::Pending,
                },
                ReportEntry {
                    step: Step::Secrets,
                    kind: "secret".to_string(),
                    name: "demo/database-url".to_string(),
                    id: None,
                    status: ReportStatus::Deferred("endpoint not ready".to_string()),
                },
            ],
            fatal: None,
        }
    }

    #[test]
    fn test_human_report_groups_by_step() {
        colored::control::set_override(false);
        let rendered = render_report(&report(), OutputFormat::Human).unwrap();

        assert!(rendered.starts_with("provision-network-tier demo"));
        assert!(rendered.contains("managed-resources\n"));
        assert!(rendered.contains("secrets\n"));
        assert!(rendered.contains("(endpoint not ready)"));
        assert!(rendered.contains("re-run this phase later"));
    }

    #[test]
    fn test_json_report_is_machine_readable() {
        let rendered = render_report(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["phase"], "network-tier");
        assert_eq!(value["entries"][0]["status"], "pending");
        assert_eq!(value["entries"][1]["detail"], "endpoint not ready");
    }
}
