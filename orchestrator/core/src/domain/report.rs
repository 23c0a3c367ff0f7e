// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Provisioning Report
//!
//! Per-resource outcome of one phase, returned by the orchestrator instead of
//! console narration. The phase outcome derives the process exit code:
//!
//! | Outcome | Exit code |
//! |---------|-----------|
//! | `Complete` | 0 |
//! | `Aborted` (authentication / precondition / fatal control-plane error) | 2 |
//! | `Partial` (pending resources or deferred secrets) | 3 |
//! | `CompletedWithFailures` | 4 |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ProvisioningError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    NetworkTier,
    ServiceTier,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkTier => f.write_str("provision-network-tier"),
            Self::ServiceTier => f.write_str("provision-service-tier"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Identity,
    Network,
    Security,
    ManagedResources,
    Secrets,
    Observability,
    Edge,
    Workload,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Identity => "identity",
            Self::Network => "network",
            Self::Security => "security",
            Self::ManagedResources => "managed-resources",
            Self::Secrets => "secrets",
            Self::Observability => "observability",
            Self::Edge => "edge",
            Self::Workload => "workload",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ReportStatus {
    /// Discovered, not created (identity, network)
    Resolved,
    Created,
    Reused,
    /// Exists but the control plane does not report it available yet
    Pending,
    /// Secret write skipped until the referenced endpoint is available
    Deferred(String),
    Published,
    Updated,
    /// Failed, but the phase continues and still counts as complete
    Degraded(String),
    /// Not attempted because a dependency is unavailable
    Skipped(String),
    Failed(String),
}

impl ReportStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Skipped(_))
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Pending | Self::Deferred(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Created => "created",
            Self::Reused => "reused",
            Self::Pending => "pending",
            Self::Deferred(_) => "deferred",
            Self::Published => "published",
            Self::Updated => "updated",
            Self::Degraded(_) => "degraded",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Deferred(detail)
            | Self::Degraded(detail)
            | Self::Skipped(detail)
            | Self::Failed(detail) => Some(detail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub step: Step,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalClass {
    Authentication,
    Precondition,
    ControlPlane,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalError {
    pub class: FatalClass,
    pub message: String,
}

impl From<&ProvisioningError> for FatalError {
    fn from(err: &ProvisioningError) -> Self {
        let class = match err {
            ProvisioningError::Authentication(_) => FatalClass::Authentication,
            ProvisioningError::Precondition(_) | ProvisioningError::Naming(_) => {
                FatalClass::Precondition
            }
            ProvisioningError::ControlPlane { .. } => FatalClass::ControlPlane,
        };
        Self {
            class,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Complete,
    Partial,
    CompletedWithFailures,
    Aborted,
}

impl PhaseOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::Aborted => 2,
            Self::Partial => 3,
            Self::CompletedWithFailures => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    pub phase: Phase,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
}

impl ProvisioningReport {
    /// Report for a phase that could not start
    pub fn aborted(phase: Phase, project: impl Into<String>, fatal: &ProvisioningError) -> Self {
        let now = Utc::now();
        Self {
            phase,
            project: project.into(),
            started_at: now,
            finished_at: now,
            entries: Vec::new(),
            fatal: Some(FatalError::from(fatal)),
        }
    }

    pub fn outcome(&self) -> PhaseOutcome {
        if self.fatal.is_some() {
            PhaseOutcome::Aborted
        } else if self.entries.iter().any(|e| e.status.is_failure()) {
            PhaseOutcome::CompletedWithFailures
        } else if self.entries.iter().any(|e| e.status.is_waiting()) {
            PhaseOutcome::Partial
        } else {
            PhaseOutcome::Complete
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome().exit_code()
    }

    pub fn entry(&self, kind: &str, name: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.name == name)
    }

    pub fn pending(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.status.is_waiting())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.status.is_failure())
    }

    pub fn count(&self, status_label: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.label() == status_label)
            .count()
    }
}
