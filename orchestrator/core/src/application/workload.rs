// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workload Provisioner
//!
//! Container cluster, workload definition and the managed service that runs
//! it behind the edge target group.
//!
//! A new definition revision is registered only when the rendered definition
//! differs from the latest one. An existing service is left as it is: moving
//! it to a newer revision is a separate, explicitly triggered operation.

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::create_or_get::{create_or_get, ProvisionFailure};
use crate::application::ledger::RunLedger;
use crate::domain::context::ProvisioningContext;
use crate::domain::control_plane::ControlPlane;
use crate::domain::report::{ReportStatus, Step};
use crate::domain::resource::{
    DesiredSpec, ResourceDescriptor, ResourceKind, ResourceRecord, ResourceRef, ServiceSpec,
};
use crate::domain::security::Tier;
use crate::domain::stack_config::WorkloadTemplate;
use crate::domain::workload::{DefinitionRevision, DescriptorContext, DescriptorRenderer, SecretBinding};

pub struct WorkloadProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    renderer: Arc<dyn DescriptorRenderer>,
    template: WorkloadTemplate,
}

impl WorkloadProvisioner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        renderer: Arc<dyn DescriptorRenderer>,
        template: WorkloadTemplate,
    ) -> Self {
        Self {
            control_plane,
            renderer,
            template,
        }
    }

    pub async fn ensure_cluster(
        &self,
        ctx: &ProvisioningContext,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let descriptor = ResourceDescriptor::new(
            ResourceKind::ContainerCluster,
            ctx.name_for(ResourceKind::ContainerCluster)?,
            DesiredSpec::ContainerCluster,
        );
        create_or_get(self.control_plane.as_ref(), ledger, Step::Workload, &descriptor)
            .await
            .map(|provisioned| provisioned.into_record())
    }

    /// Secret references resolved to the names the network tier publishes
    pub fn secret_bindings(ctx: &ProvisioningContext) -> Vec<SecretBinding> {
        let names = ctx.secret_names();
        [
            ("DATABASE_URL", &names.database_url),
            ("REDIS_URL", &names.cache_url),
            ("SECRET_KEY", &names.signing_key),
        ]
        .into_iter()
        .map(|(env_name, secret_name)| SecretBinding {
            env_name: env_name.to_string(),
            secret_name: secret_name.clone(),
        })
        .collect()
    }

    pub async fn register_definition(
        &self,
        ctx: &ProvisioningContext,
        log_sink: &str,
        ledger: &mut RunLedger,
    ) -> Result<DefinitionRevision, ProvisionFailure> {
        let family = ctx.name_for(ResourceKind::WorkloadDefinition)?;
        let kind = ResourceKind::WorkloadDefinition;

        let context = DescriptorContext::new(ctx.account().as_str(), ctx.region(), ctx.project());
        let definition = match self.renderer.render_workload(
            &self.template,
            &context,
            family.as_str(),
            log_sink,
            Self::secret_bindings(ctx),
        ) {
            Ok(definition) => definition,
            Err(err) => {
                let failure = ProvisionFailure::InvalidSpec(format!("{:#}", err));
                ledger.record(Step::Workload, kind, &family, None, ReportStatus::Failed(failure.to_string()));
                return Err(failure);
            }
        };

        let latest = match self.control_plane.latest_workload_definition(family.as_str()).await {
            Ok(latest) => latest,
            Err(err) => {
                ledger.record(Step::Workload, kind, &family, None, ReportStatus::Failed(err.to_string()));
                return Err(err.into());
            }
        };

        if let Some(latest) = latest.filter(|latest| latest.definition == definition) {
            info!(revision = %latest.revision, "Workload definition unchanged");
            ledger.record(
                Step::Workload,
                kind,
                &family,
                Some(latest.revision.id()),
                ReportStatus::Reused,
            );
            return Ok(latest.revision);
        }

        match self.control_plane.register_workload_definition(&definition).await {
            Ok(revision) => {
                info!(revision = %revision, image = %definition.image, "Registered workload definition");
                ledger.record(Step::Workload, kind, &family, Some(revision.id()), ReportStatus::Created);
                Ok(revision)
            }
            Err(err) => {
                warn!(family = %family, error = %err, "Workload definition registration failed");
                ledger.record(Step::Workload, kind, &family, None, ReportStatus::Failed(err.to_string()));
                Err(err.into())
            }
        }
    }

    pub async fn ensure_service(
        &self,
        ctx: &ProvisioningContext,
        cluster: &ResourceRecord,
        revision: &DefinitionRevision,
        target_group: &ResourceRecord,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let boundary = ResourceRef {
            kind: ResourceKind::SecurityBoundary,
            name: ctx.boundary_name(Tier::Compute)?,
        };
        let descriptor = ResourceDescriptor::new(
            ResourceKind::ManagedService,
            ctx.name_for(ResourceKind::ManagedService)?,
            DesiredSpec::ManagedService(ServiceSpec {
                cluster_id: cluster.id.clone(),
                definition_id: revision.id(),
                desired_count: self.template.desired_count,
                subnet_ids: ctx.network().private_subnets(),
                boundary_id: ctx.boundaries().compute.clone(),
                assign_public_ip: self.template.assign_public_ip,
                target_group_id: target_group.id.clone(),
                container_name: self.template.container_name.clone(),
                container_port: self.template.port,
                health_check_grace_seconds: self.template.health_check_grace_seconds,
            }),
        )
        .depends_on(cluster.reference())
        .depends_on(target_group.reference())
        .depends_on(boundary);

        let provisioned =
            create_or_get(self.control_plane.as_ref(), ledger, Step::Workload, &descriptor).await?;
        if !provisioned.was_created() {
            info!(
                service = %descriptor.name,
                revision = %revision,
                "Service exists; not moving it to the registered revision"
            );
        }
        Ok(provisioned.into_record())
    }
}
