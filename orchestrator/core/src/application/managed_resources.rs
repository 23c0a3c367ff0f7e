// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Managed Resource Provisioner
//!
//! Create-or-fetch for the stateful managed resources (database instance,
//! cache cluster) and the subnet groups they live in.
//!
//! # Flow
//!
//! 1. Ensure the subnet group over the two located subnets
//! 2. Describe the resource by its logical name
//! 3. Found → return its endpoint and state (`Available` or `Pending`)
//! 4. Absent → issue the create and return a pending endpoint immediately
//!
//! Creation is asynchronous on the control plane; nothing here waits for it.
//! Readiness is observed by the next invocation.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use crate::application::create_or_get::{
    create_or_get, describe_or_create, ProvisionFailure, Provisioned,
};
use crate::application::ledger::RunLedger;
use crate::domain::context::ProvisioningContext;
use crate::domain::control_plane::ControlPlane;
use crate::domain::endpoint::Endpoint;
use crate::domain::report::Step;
use crate::domain::resource::{
    CacheSpec, DatabaseSpec, DesiredSpec, ResourceDescriptor, ResourceKind, ResourceRecord,
    ResourceRef, ResourceState,
};
use crate::domain::secret::Credential;
use crate::domain::security::Tier;
use crate::domain::stack_config::{CacheConfig, DatabaseConfig};

/// Alphanumeric only; `/`, `@`, `"` and spaces are rejected for master passwords
pub const CREDENTIAL_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedOutcome {
    pub record: ResourceRecord,
    pub endpoint: Endpoint,
    pub state: ResourceState,
    pub created: bool,
    /// Set only when this run's create was accepted
    pub fresh_credential: Option<Credential>,
}

impl ManagedOutcome {
    fn from_provisioned(provisioned: Provisioned) -> Self {
        let created = provisioned.was_created();
        let record = provisioned.into_record();
        Self {
            endpoint: record.endpoint(),
            state: record.state,
            record,
            created,
            fresh_credential: None,
        }
    }

    pub fn was_created(&self) -> bool {
        self.created
    }
}

pub struct ManagedResourceProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    database: DatabaseConfig,
    cache: CacheConfig,
}

impl ManagedResourceProvisioner {
    pub fn new(control_plane: Arc<dyn ControlPlane>, database: DatabaseConfig, cache: CacheConfig) -> Self {
        Self {
            control_plane,
            database,
            cache,
        }
    }

    pub fn generate_credential() -> Credential {
        let value: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(CREDENTIAL_LENGTH)
            .map(char::from)
            .collect();
        Credential::new(value)
    }

    pub async fn ensure_subnet_group(
        &self,
        ctx: &ProvisioningContext,
        kind: ResourceKind,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRecord, ProvisionFailure> {
        let descriptor = ResourceDescriptor::new(
            kind,
            ctx.name_for(kind)?,
            DesiredSpec::SubnetGroup {
                subnet_ids: ctx.network().private_subnets(),
                description: format!("{} {}", ctx.project(), kind),
            },
        );
        let provisioned =
            create_or_get(self.control_plane.as_ref(), ledger, Step::ManagedResources, &descriptor).await?;
        Ok(provisioned.into_record())
    }

    /// Describe, else create; never blocks on asynchronous completion
    pub async fn ensure<F>(
        &self,
        descriptor: &ResourceDescriptor,
        spec_for_create: F,
        ledger: &mut RunLedger,
    ) -> Result<ManagedOutcome, ProvisionFailure>
    where
        F: FnOnce() -> DesiredSpec + Send,
    {
        let provisioned = describe_or_create(
            self.control_plane.as_ref(),
            ledger,
            Step::ManagedResources,
            descriptor,
            spec_for_create,
        )
        .await?;
        let outcome = ManagedOutcome::from_provisioned(provisioned);
        info!(
            kind = %descriptor.kind,
            name = %descriptor.name,
            state = %outcome.state,
            "Managed resource state"
        );
        Ok(outcome)
    }

    pub async fn ensure_database(
        &self,
        ctx: &ProvisioningContext,
        ledger: &mut RunLedger,
    ) -> Result<ManagedOutcome, ProvisionFailure> {
        let group = self
            .subnet_group_ref(ctx, ResourceKind::DatabaseSubnetGroup, ledger)
            .await?;

        let spec = DatabaseSpec {
            engine: self.database.engine.clone(),
            engine_version: self.database.engine_version.clone(),
            instance_class: self.database.instance_class.clone(),
            storage_gb: self.database.storage_gb,
            multi_zone: self.database.multi_zone,
            encrypted: self.database.encrypted,
            port: self.database.port,
            database_name: self.database.database_name.clone(),
            master_username: self.database.master_username.clone(),
            master_password: Credential::new(""),
            subnet_group: group.name.clone(),
            boundary_id: ctx.boundaries().database.clone(),
            backup_retention_days: self.database.backup_retention_days,
        };
        let descriptor = self.descriptor(
            ctx,
            ResourceKind::DatabaseInstance,
            DesiredSpec::DatabaseInstance(spec.clone()),
            group,
            Tier::Database,
        )?;

        let mut fresh = None;
        let mut outcome = self
            .ensure(
                &descriptor,
                || {
                    let credential = Self::generate_credential();
                    fresh = Some(credential.clone());
                    DesiredSpec::DatabaseInstance(DatabaseSpec {
                        master_password: credential,
                        ..spec
                    })
                },
                ledger,
            )
            .await?;
        // A create that lost to a concurrent run leaves the winner's password in place
        if outcome.created {
            outcome.fresh_credential = fresh;
        }
        Ok(outcome)
    }

    pub async fn ensure_cache(
        &self,
        ctx: &ProvisioningContext,
        ledger: &mut RunLedger,
    ) -> Result<ManagedOutcome, ProvisionFailure> {
        let group = self
            .subnet_group_ref(ctx, ResourceKind::CacheSubnetGroup, ledger)
            .await?;

        let spec = DesiredSpec::CacheCluster(CacheSpec {
            engine: self.cache.engine.clone(),
            node_type: self.cache.node_type.clone(),
            node_count: self.cache.node_count,
            port: self.cache.port,
            subnet_group: group.name.clone(),
            boundary_id: ctx.boundaries().cache.clone(),
        });
        let descriptor = self.descriptor(
            ctx,
            ResourceKind::CacheCluster,
            spec,
            group,
            Tier::Cache,
        )?;

        let create_spec = descriptor.spec.clone();
        self.ensure(&descriptor, move || create_spec, ledger).await
    }

    /// Ensure the group, but hand back its reference even when that fails so
    /// the dependent resource is still reported as skipped.
    async fn subnet_group_ref(
        &self,
        ctx: &ProvisioningContext,
        kind: ResourceKind,
        ledger: &mut RunLedger,
    ) -> Result<ResourceRef, ProvisionFailure> {
        match self.ensure_subnet_group(ctx, kind, ledger).await {
            Ok(record) => Ok(record.reference()),
            Err(failure) if failure.is_unauthenticated() => Err(failure),
            Err(_) => Ok(ResourceRef {
                kind,
                name: ctx.name_for(kind)?,
            }),
        }
    }

    fn descriptor(
        &self,
        ctx: &ProvisioningContext,
        kind: ResourceKind,
        spec: DesiredSpec,
        subnet_group: ResourceRef,
        tier: Tier,
    ) -> Result<ResourceDescriptor, ProvisionFailure> {
        let boundary = ResourceRef {
            kind: ResourceKind::SecurityBoundary,
            name: ctx.boundary_name(tier)?,
        };
        Ok(
            ResourceDescriptor::new(kind, ctx.name_for(kind)?, spec)
                .depends_on(subnet_group)
                .depends_on(boundary),
        )
    }
}
