// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::warn;

use crate::application::create_or_get::create_or_get;
use crate::application::ledger::RunLedger;
use crate::domain::control_plane::ControlPlane;
use crate::domain::report::{ReportStatus, Step};
use crate::domain::resource::{DesiredSpec, LogicalName, ResourceDescriptor, ResourceKind};

/// Ensures the workload's log sink exists.
///
/// Never fails the phase: the workload runs without a sink, so any error is
/// logged and reported as degraded.
pub struct ObservabilityBootstrapper {
    control_plane: Arc<dyn ControlPlane>,
    retention_days: u32,
}

impl ObservabilityBootstrapper {
    pub fn new(control_plane: Arc<dyn ControlPlane>, retention_days: u32) -> Self {
        Self {
            control_plane,
            retention_days,
        }
    }

    pub async fn ensure(&self, log_sink_name: &str, ledger: &mut RunLedger) {
        let descriptor = ResourceDescriptor::new(
            ResourceKind::LogSink,
            LogicalName::from_existing(log_sink_name),
            DesiredSpec::LogSink {
                retention_days: self.retention_days,
            },
        );

        // Record into a scratch ledger so a failure shows up as degraded, not failed.
        let mut scratch = RunLedger::new(ledger.phase(), ledger.project());
        match create_or_get(self.control_plane.as_ref(), &mut scratch, Step::Observability, &descriptor).await {
            Ok(provisioned) => {
                ledger.record_resource(Step::Observability, provisioned.record(), provisioned.was_created());
            }
            Err(failure) => {
                warn!(sink = %log_sink_name, "Log sink unavailable, continuing without it: {}", failure);
                ledger.record(
                    Step::Observability,
                    ResourceKind::LogSink,
                    log_sink_name,
                    None,
                    ReportStatus::Degraded(failure.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::Phase;
    use crate::infrastructure::in_memory::InMemoryControlPlane;

    #[tokio::test]
    async fn test_failure_is_degraded_not_fatal() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        control_plane.fail_create_for(ResourceKind::LogSink, "permission denied");
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");

        ObservabilityBootstrapper::new(control_plane, 7)
            .ensure("p-logs", &mut ledger)
            .await;

        let report = ledger.finish(None);
        assert_eq!(report.entries.len(), 1);
        assert!(matches!(report.entries[0].status, ReportStatus::Degraded(_)));
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_existing_sink_is_reused() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let bootstrapper = ObservabilityBootstrapper::new(control_plane.clone(), 7);
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");

        bootstrapper.ensure("p-logs", &mut ledger).await;
        bootstrapper.ensure("p-logs", &mut ledger).await;

        assert_eq!(control_plane.resource_count(), 1);
        assert_eq!(ledger.entries()[0].status, ReportStatus::Created);
        assert_eq!(ledger.entries()[1].status, ReportStatus::Reused);
    }
}
