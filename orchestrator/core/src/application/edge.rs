// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Edge Provisioner
//!
//! Load balancer, target group and listener in front of the workload. Each
//! step is an independent create-or-get; the listener depends on the other two.

use std::sync::Arc;

use crate::application::create_or_get::{create_or_get, ProvisionFailure};
use crate::application::ledger::RunLedger;
use crate::domain::context::ProvisioningContext;
use crate::domain::control_plane::ControlPlane;
use crate::domain::report::Step;
use crate::domain::resource::{DesiredSpec, ResourceDescriptor, ResourceKind, ResourceRecord, ResourceRef};
use crate::domain::security::Tier;
use crate::domain::stack_config::EdgeConfig;

const PROTOCOL: &str = "HTTP";

pub struct EdgeProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    config: EdgeConfig,
    workload_port: u16,
}

impl EdgeProvisioner {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: EdgeConfig, workload_port: u16) -> Self {
        Self {
            control_plane,
            config,
            workload_port,
        }
    }

    pub async fn ensure_load_balancer(
        &self,
        ctx: &ProvisioningContext,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let boundary = ResourceRef {
            kind: ResourceKind::SecurityBoundary,
            name: ctx.boundary_name(Tier::Edge)?,
        };
        let descriptor = ResourceDescriptor::new(
            ResourceKind::LoadBalancer,
            ctx.name_for(ResourceKind::LoadBalancer)?,
            DesiredSpec::LoadBalancer {
                subnet_ids: ctx.network().public_subnets(),
                boundary_id: ctx.boundaries().edge.clone(),
                internet_facing: true,
            },
        )
        .depends_on(boundary);
        self.provision(&descriptor, ledger).await
    }

    pub async fn ensure_target_group(
        &self,
        ctx: &ProvisioningContext,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let descriptor = ResourceDescriptor::new(
            ResourceKind::TargetGroup,
            ctx.name_for(ResourceKind::TargetGroup)?,
            DesiredSpec::TargetGroup {
                network_id: ctx.network().network_id().clone(),
                protocol: PROTOCOL.to_string(),
                port: self.workload_port,
                health_check: self.config.health_check.clone(),
            },
        );
        self.provision(&descriptor, ledger).await
    }

    /// Forwards everything on the listener port to the target group
    pub async fn ensure_listener(
        &self,
        ctx: &ProvisioningContext,
        load_balancer: &ResourceRecord,
        target_group: &ResourceRecord,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let descriptor = ResourceDescriptor::new(
            ResourceKind::Listener,
            ctx.name_for(ResourceKind::Listener)?,
            DesiredSpec::Listener {
                load_balancer_id: load_balancer.id.clone(),
                target_group_id: target_group.id.clone(),
                protocol: PROTOCOL.to_string(),
                port: self.config.listener_port,
            },
        )
        .depends_on(load_balancer.reference())
        .depends_on(target_group.reference());
        self.provision(&descriptor, ledger).await
    }

    async fn provision(
        &self,
        descriptor: &ResourceDescriptor,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        create_or_get(self.control_plane.as_ref(), ledger, Step::Edge, descriptor)
            .await
            .map(|provisioned| provisioned.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::network_locator::NetworkLocator;
    use crate::application::security_policy::SecurityPolicyBuilder;
    use crate::domain::context::AccountId;
    use crate::domain::report::{Phase, ReportStatus};
    use crate::domain::resource::ResourceState;
    use crate::domain::security::TierPorts;
    use crate::infrastructure::in_memory::InMemoryControlPlane;

    async fn setup() -> (Arc<InMemoryControlPlane>, ProvisioningContext, RunLedger) {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let mut ledger = RunLedger::new(Phase::ServiceTier, "p");
        let network = NetworkLocator::new(control_plane.clone()).locate().await.unwrap();
        let builder = SecurityPolicyBuilder::new(
            control_plane.clone(),
            "p",
            TierPorts {
                workload: 8000,
                database: 5432,
                cache: 6379,
            },
        );
        builder.build(&network, &mut ledger).await.unwrap();
        let boundaries = builder.lookup_existing(&mut ledger).await.unwrap();
        let ctx = ProvisioningContext::new("p", "eu-central-1", AccountId("acct-1".to_string()), network, boundaries);
        (control_plane, ctx, ledger)
    }

    #[tokio::test]
    async fn test_edge_chain_is_idempotent() {
        let (control_plane, ctx, mut ledger) = setup().await;
        let edge = EdgeProvisioner::new(control_plane.clone(), EdgeConfig::default(), 8000);

        let lb = edge.ensure_load_balancer(&ctx, &mut ledger).await.unwrap();
        let tg = edge.ensure_target_group(&ctx, &mut ledger).await.unwrap();
        let listener = edge.ensure_listener(&ctx, &lb, &tg, &mut ledger).await.unwrap();
        let count = control_plane.resource_count();

        let again = edge.ensure_listener(&ctx, &lb, &tg, &mut ledger).await.unwrap();
        assert_eq!(listener.id, again.id);
        assert_eq!(control_plane.resource_count(), count);
        assert_eq!(listener.state, ResourceState::Available);
    }

    #[tokio::test]
    async fn test_target_group_carries_health_check() {
        let (control_plane, ctx, mut ledger) = setup().await;
        let edge = EdgeProvisioner::new(control_plane.clone(), EdgeConfig::default(), 8000);

        let tg = edge.ensure_target_group(&ctx, &mut ledger).await.unwrap();
        match control_plane.spec_of(ResourceKind::TargetGroup, &tg.name) {
            Some(DesiredSpec::TargetGroup { port, health_check, .. }) => {
                assert_eq!(port, 8000);
                assert_eq!(health_check.path, "/health");
                assert_eq!(health_check.interval_seconds, 30);
                assert_eq!(health_check.timeout_seconds, 5);
                assert_eq!(health_check.healthy_threshold, 2);
                assert_eq!(health_check.unhealthy_threshold, 3);
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listener_skipped_when_load_balancer_failed() {
        let (control_plane, ctx, mut ledger) = setup().await;
        control_plane.fail_create_for(ResourceKind::LoadBalancer, "quota exceeded");
        let edge = EdgeProvisioner::new(control_plane.clone(), EdgeConfig::default(), 8000);

        assert!(edge.ensure_load_balancer(&ctx, &mut ledger).await.is_err());
        let tg = edge.ensure_target_group(&ctx, &mut ledger).await.unwrap();
        let lb_ref = ResourceRecord {
            kind: ResourceKind::LoadBalancer,
            name: ctx.name_for(ResourceKind::LoadBalancer).unwrap(),
            id: crate::domain::resource::ResourceId::new("unknown"),
            state: ResourceState::Failed,
            address: None,
            attributes: Default::default(),
        };

        let result = edge.ensure_listener(&ctx, &lb_ref, &tg, &mut ledger).await;
        assert!(matches!(result, Err(ProvisionFailure::DependencyUnavailable(_))));
        assert!(matches!(
            ledger.entries().last().map(|e| &e.status),
            Some(ReportStatus::Skipped(_))
        ));
    }
}
