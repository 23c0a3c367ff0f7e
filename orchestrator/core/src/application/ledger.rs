// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transient per-run bookkeeping.
//!
//! Tracks what the control plane reported during the current run so
//! dependents can be gated on their dependencies, and accumulates the report
//! entries. Dropped at the end of the run; nothing here is persisted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::errors::ProvisioningError;
use crate::domain::report::{FatalError, Phase, ProvisioningReport, ReportEntry, ReportStatus, Step};
use crate::domain::resource::{ResourceDescriptor, ResourceRecord, ResourceRef, ResourceState};

pub struct RunLedger {
    phase: Phase,
    project: String,
    started_at: DateTime<Utc>,
    states: HashMap<ResourceRef, ResourceState>,
    entries: Vec<ReportEntry>,
}

impl RunLedger {
    pub fn new(phase: Phase, project: impl Into<String>) -> Self {
        Self {
            phase,
            project: project.into(),
            started_at: Utc::now(),
            states: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn record(
        &mut self,
        step: Step,
        kind: impl std::fmt::Display,
        name: impl std::fmt::Display,
        id: Option<String>,
        status: ReportStatus,
    ) {
        self.entries.push(ReportEntry {
            step,
            kind: kind.to_string(),
            name: name.to_string(),
            id,
            status,
        });
    }

    /// Remember a control-plane record and report it as created or reused
    pub fn record_resource(&mut self, step: Step, record: &ResourceRecord, created: bool) {
        self.states.insert(record.reference(), record.state);
        let status = match (created, record.state) {
            (_, ResourceState::Failed) => {
                ReportStatus::Failed("control plane reports the resource as failed".to_string())
            }
            (_, state) if !state.is_available() => ReportStatus::Pending,
            (true, _) => ReportStatus::Created,
            (false, _) => ReportStatus::Reused,
        };
        self.record(
            step,
            record.kind,
            &record.name,
            Some(record.id.to_string()),
            status,
        );
    }

    pub fn record_failure(&mut self, step: Step, reference: &ResourceRef, reason: impl Into<String>) {
        self.states.insert(reference.clone(), ResourceState::Failed);
        self.record(
            step,
            reference.kind,
            &reference.name,
            None,
            ReportStatus::Failed(reason.into()),
        );
    }

    pub fn record_skipped(&mut self, step: Step, reference: &ResourceRef, reason: impl Into<String>) {
        self.states.insert(reference.clone(), ResourceState::Absent);
        self.record(
            step,
            reference.kind,
            &reference.name,
            None,
            ReportStatus::Skipped(reason.into()),
        );
    }

    pub fn state_of(&self, reference: &ResourceRef) -> ResourceState {
        self.states
            .get(reference)
            .copied()
            .unwrap_or(ResourceState::Absent)
    }

    /// Dependencies that neither exist nor are available in this run
    pub fn unmet_dependencies<'a>(&self, descriptor: &'a ResourceDescriptor) -> Vec<&'a ResourceRef> {
        descriptor
            .depends_on
            .iter()
            .filter(|dep| !self.state_of(dep).is_reusable())
            .collect()
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn finish(self, fatal: Option<&ProvisioningError>) -> ProvisioningReport {
        ProvisioningReport {
            phase: self.phase,
            project: self.project,
            started_at: self.started_at,
            finished_at: Utc::now(),
            entries: self.entries,
            fatal: fatal.map(FatalError::from),
        }
    }
}
