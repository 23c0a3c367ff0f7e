// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Security Policy Builder
//!
//! One isolation boundary per tier (edge, compute, database, cache) plus the
//! directional allow-rules between them.
//!
//! Rules are additive only: this module adds the rules it requests, treats a
//! duplicate as success, and never modifies or removes any other rule. Any
//! failure other than `AlreadyExists` is fatal for the phase.

use std::sync::Arc;
use tracing::{debug, info};

use crate::application::create_or_get::{create_or_get, ProvisionFailure};
use crate::application::ledger::RunLedger;
use crate::domain::control_plane::ControlPlane;
use crate::domain::errors::ProvisioningError;
use crate::domain::network::NetworkTopology;
use crate::domain::report::{ReportStatus, Step};
use crate::domain::resource::{DesiredSpec, LogicalName, ResourceDescriptor, ResourceId, ResourceKind};
use crate::domain::security::{directional_rules, SecurityBoundaries, SecurityRule, Tier, TierPorts};

const RULE_KIND: &str = "security-rule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Added,
    AlreadyPresent,
}

pub struct SecurityPolicyBuilder {
    control_plane: Arc<dyn ControlPlane>,
    project: String,
    ports: TierPorts,
}

impl SecurityPolicyBuilder {
    pub fn new(control_plane: Arc<dyn ControlPlane>, project: impl Into<String>, ports: TierPorts) -> Self {
        Self {
            control_plane,
            project: project.into(),
            ports,
        }
    }

    fn boundary_name(&self, tier: Tier) -> Result<LogicalName, ProvisioningError> {
        Ok(LogicalName::derive_qualified(
            &self.project,
            ResourceKind::SecurityBoundary,
            tier.as_str(),
        )?)
    }

    /// Ensure all four boundaries and every directional rule
    pub async fn build(
        &self,
        network: &NetworkTopology,
        ledger: &mut RunLedger,
    ) -> Result<SecurityBoundaries, ProvisioningError> {
        let boundaries = SecurityBoundaries {
            edge: self.create_or_get(Tier::Edge, network, ledger).await?,
            compute: self.create_or_get(Tier::Compute, network, ledger).await?,
            database: self.create_or_get(Tier::Database, network, ledger).await?,
            cache: self.create_or_get(Tier::Cache, network, ledger).await?,
        };

        for (tier, rule) in directional_rules(&boundaries, self.ports) {
            self.ensure_rule(tier, boundaries.get(tier), &rule, ledger).await?;
        }

        info!(project = %self.project, "Security boundaries ready");
        Ok(boundaries)
    }

    pub async fn create_or_get(
        &self,
        tier: Tier,
        network: &NetworkTopology,
        ledger: &mut RunLedger,
    ) -> Result<ResourceId, ProvisioningError> {
        let name = self.boundary_name(tier)?;
        let descriptor = ResourceDescriptor::new(
            ResourceKind::SecurityBoundary,
            name.clone(),
            DesiredSpec::SecurityBoundary {
                tier,
                network_id: network.network_id().clone(),
                description: format!("{} {} tier", self.project, tier),
            },
        );

        create_or_get(self.control_plane.as_ref(), ledger, Step::Security, &descriptor)
            .await
            .map(|provisioned| provisioned.into_record().id)
            .map_err(|failure| fatal(name.to_string(), failure))
    }

    /// Add one rule; a duplicate counts as success
    pub async fn ensure_rule(
        &self,
        tier: Tier,
        boundary: &ResourceId,
        rule: &SecurityRule,
        ledger: &mut RunLedger,
    ) -> Result<RuleOutcome, ProvisioningError> {
        let label = format!("{} {}", self.boundary_name(tier)?, rule);
        match self.control_plane.add_rule(boundary, rule).await {
            Ok(()) => {
                info!(boundary = %boundary, rule = %rule, "Added rule");
                ledger.record(Step::Security, RULE_KIND, &label, None, ReportStatus::Created);
                Ok(RuleOutcome::Added)
            }
            Err(err) if err.is_already_exists() => {
                debug!(boundary = %boundary, rule = %rule, "Rule already present");
                ledger.record(Step::Security, RULE_KIND, &label, None, ReportStatus::Reused);
                Ok(RuleOutcome::AlreadyPresent)
            }
            Err(err) => {
                ledger.record(
                    Step::Security,
                    RULE_KIND,
                    &label,
                    None,
                    ReportStatus::Failed(err.to_string()),
                );
                Err(ProvisioningError::control_plane(label, err))
            }
        }
    }

    /// Look up boundaries created by an earlier network-tier run.
    ///
    /// Used by the service tier, which must not create boundaries itself; an
    /// absent boundary is a precondition failure.
    pub async fn lookup_existing(
        &self,
        ledger: &mut RunLedger,
    ) -> Result<SecurityBoundaries, ProvisioningError> {
        let mut ids = Vec::with_capacity(Tier::ALL.len());
        for tier in Tier::ALL {
            let name = self.boundary_name(tier)?;
            let record = self
                .control_plane
                .describe(ResourceKind::SecurityBoundary, &name)
                .await
                .map_err(|err| ProvisioningError::control_plane(name.to_string(), err))?
                .ok_or_else(|| {
                    ProvisioningError::Precondition(format!(
                        "security boundary '{}' not found; run provision-network-tier first",
                        name
                    ))
                })?;
            ledger.record_resource(Step::Security, &record, false);
            ids.push(record.id);
        }

        let mut ids = ids.into_iter();
        match (ids.next(), ids.next(), ids.next(), ids.next()) {
            (Some(edge), Some(compute), Some(database), Some(cache)) => Ok(SecurityBoundaries {
                edge,
                compute,
                database,
                cache,
            }),
            _ => Err(ProvisioningError::Precondition(
                "incomplete security boundary set".to_string(),
            )),
        }
    }
}

fn fatal(resource: String, failure: ProvisionFailure) -> ProvisioningError {
    match failure {
        ProvisionFailure::ControlPlane(err) => ProvisioningError::control_plane(resource, err),
        other => ProvisioningError::Precondition(format!("{}: {}", resource, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::network_locator::NetworkLocator;
    use crate::domain::report::Phase;
    use crate::infrastructure::in_memory::InMemoryControlPlane;

    const PORTS: TierPorts = TierPorts {
        workload: 8000,
        database: 5432,
        cache: 6379,
    };

    async fn topology(control_plane: &Arc<InMemoryControlPlane>) -> NetworkTopology {
        NetworkLocator::new(control_plane.clone()).locate().await.unwrap()
    }

    #[tokio::test]
    async fn test_build_twice_yields_same_boundaries_and_rules() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let network = topology(&control_plane).await;
        let builder = SecurityPolicyBuilder::new(control_plane.clone(), "p", PORTS);

        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");
        let first = builder.build(&network, &mut ledger).await.unwrap();
        let rules_after_first = control_plane.rule_count();

        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");
        let second = builder.build(&network, &mut ledger).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(rules_after_first, 5);
        assert_eq!(control_plane.rule_count(), 5);
        assert!(ledger
            .entries()
            .iter()
            .all(|entry| entry.status == ReportStatus::Reused));
    }

    #[tokio::test]
    async fn test_duplicate_rule_is_success() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let network = topology(&control_plane).await;
        let builder = SecurityPolicyBuilder::new(control_plane.clone(), "p", PORTS);
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");
        let edge = builder.create_or_get(Tier::Edge, &network, &mut ledger).await.unwrap();

        let rule = SecurityRule::tcp(443, crate::domain::security::RuleSource::Cidr("0.0.0.0/0".to_string()));
        let first = builder.ensure_rule(Tier::Edge, &edge, &rule, &mut ledger).await.unwrap();
        let second = builder.ensure_rule(Tier::Edge, &edge, &rule, &mut ledger).await.unwrap();

        assert_eq!(first, RuleOutcome::Added);
        assert_eq!(second, RuleOutcome::AlreadyPresent);
        assert!(control_plane.rules_for(&edge).contains(&rule));
        assert_eq!(control_plane.rules_for(&edge).len(), 1);
    }

    #[tokio::test]
    async fn test_permission_failure_is_fatal() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        control_plane.fail_create_for(ResourceKind::SecurityBoundary, "not authorized");
        let network = topology(&control_plane).await;
        let builder = SecurityPolicyBuilder::new(control_plane.clone(), "p", PORTS);

        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");
        let err = builder.build(&network, &mut ledger).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::ControlPlane { .. }));
    }

    #[tokio::test]
    async fn test_lookup_requires_existing_boundaries() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let builder = SecurityPolicyBuilder::new(control_plane.clone(), "p", PORTS);
        let mut ledger = RunLedger::new(Phase::ServiceTier, "p");

        let err = builder.lookup_existing(&mut ledger).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::Precondition(_)));

        let network = topology(&control_plane).await;
        let built = builder.build(&network, &mut ledger).await.unwrap();
        let found = builder.lookup_existing(&mut ledger).await.unwrap();
        assert_eq!(built, found);
    }
}
