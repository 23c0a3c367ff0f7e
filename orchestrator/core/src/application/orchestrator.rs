// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestrator
//!
//! Sequences the provisioning components for each phase, strictly in
//! dependency order, and turns the run into a [`ProvisioningReport`].
//!
//! # Phases
//!
//! - `provision-network-tier`: identity → network → security boundaries →
//!   database and cache → secrets → log sink
//! - `provision-service-tier`: identity → network → existing boundaries →
//!   load balancer, target group, listener → cluster, definition, service
//!
//! Identity, network discovery and the security boundaries gate everything
//! after them; a failure there aborts the phase. Any other resource failure is
//! recorded and the phase continues with whatever does not depend on it.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::create_or_get::ProvisionFailure;
use crate::application::edge::EdgeProvisioner;
use crate::application::identity::IdentityResolver;
use crate::application::ledger::RunLedger;
use crate::application::managed_resources::{ManagedOutcome, ManagedResourceProvisioner};
use crate::application::network_locator::NetworkLocator;
use crate::application::observability::ObservabilityBootstrapper;
use crate::application::secret_distributor::{SecretDistributor, SECRET_KIND};
use crate::application::security_policy::SecurityPolicyBuilder;
use crate::application::workload::WorkloadProvisioner;
use crate::domain::context::{AccountId, CallerCredentials, ProvisioningContext};
use crate::domain::control_plane::{ControlPlane, ControlPlaneError, SecretStore};
use crate::domain::errors::ProvisioningError;
use crate::domain::network::NetworkTopology;
use crate::domain::report::{Phase, ProvisioningReport, ReportStatus, Step};
use crate::domain::resource::{ResourceKind, ResourceRef};
use crate::domain::secret::ConnectionSpec;
use crate::domain::security::TierPorts;
use crate::domain::stack_config::StackConfigManifest;
use crate::domain::workload::DescriptorRenderer;

pub struct Orchestrator {
    control_plane: Arc<dyn ControlPlane>,
    secret_store: Arc<dyn SecretStore>,
    renderer: Arc<dyn DescriptorRenderer>,
    credentials: Option<CallerCredentials>,
    config: StackConfigManifest,
}

impl Orchestrator {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        secret_store: Arc<dyn SecretStore>,
        renderer: Arc<dyn DescriptorRenderer>,
        credentials: Option<CallerCredentials>,
        config: StackConfigManifest,
    ) -> Self {
        Self {
            control_plane,
            secret_store,
            renderer,
            credentials,
            config,
        }
    }

    pub async fn provision_network_tier(&self) -> ProvisioningReport {
        let mut ledger = RunLedger::new(Phase::NetworkTier, &self.config.spec.project);
        let result = self.network_tier(&mut ledger).await;
        self.finish(ledger, result)
    }

    pub async fn provision_service_tier(&self) -> ProvisioningReport {
        let mut ledger = RunLedger::new(Phase::ServiceTier, &self.config.spec.project);
        let result = self.service_tier(&mut ledger).await;
        self.finish(ledger, result)
    }

    fn finish(&self, ledger: RunLedger, result: Result<(), ProvisioningError>) -> ProvisioningReport {
        let phase = ledger.phase();
        if let Err(err) = &result {
            error!(phase = %phase, "Phase aborted: {}", err);
        }
        let report = ledger.finish(result.err().as_ref());
        info!(
            phase = %phase,
            outcome = ?report.outcome(),
            pending = report.pending().count(),
            failed = report.failed().count(),
            "Phase finished"
        );
        report
    }

    fn ports(&self) -> TierPorts {
        TierPorts {
            workload: self.config.spec.workload.port,
            database: self.config.spec.database.port,
            cache: self.config.spec.cache.port,
        }
    }

    fn security_policy(&self) -> SecurityPolicyBuilder {
        SecurityPolicyBuilder::new(self.control_plane.clone(), &self.config.spec.project, self.ports())
    }

    /// Identity and network discovery, shared by both phases
    async fn discover(&self, ledger: &mut RunLedger) -> Result<(AccountId, NetworkTopology), ProvisioningError> {
        let spec = &self.config.spec;
        let account = IdentityResolver::new(self.control_plane.clone(), self.credentials.clone(), &spec.profile)
            .resolve()
            .await?;
        ledger.record(Step::Identity, "account", &account, None, ReportStatus::Resolved);

        let network = NetworkLocator::new(self.control_plane.clone()).locate().await?;
        ledger.record(
            Step::Network,
            "network",
            network.network_id(),
            None,
            ReportStatus::Resolved,
        );
        for subnet in [&network.primary, &network.secondary] {
            ledger.record(Step::Network, "subnet", &subnet.id, None, ReportStatus::Resolved);
        }
        Ok((account, network))
    }

    async fn network_tier(&self, ledger: &mut RunLedger) -> Result<(), ProvisioningError> {
        let spec = &self.config.spec;
        let (account, network) = self.discover(ledger).await?;
        let boundaries = self.security_policy().build(&network, ledger).await?;
        let ctx = ProvisioningContext::new(&spec.project, &spec.region, account, network, boundaries);

        let managed = ManagedResourceProvisioner::new(
            self.control_plane.clone(),
            spec.database.clone(),
            spec.cache.clone(),
        );
        let database = tolerate(managed.ensure_database(&ctx, ledger).await)?;
        let cache = tolerate(managed.ensure_cache(&ctx, ledger).await)?;

        let distributor = SecretDistributor::new(self.secret_store.clone());
        let names = ctx.secret_names();

        if let Some(credential) = database.as_ref().and_then(|db| db.fresh_credential.as_ref()) {
            let _ = distributor
                .remember_credential(&names.database_master_credential, credential, ledger)
                .await;
        }
        let _ = distributor.publish_signing_key(&names.signing_key, ledger).await;
        self.publish_database_url(&distributor, &ctx, database.as_ref(), ledger).await;

        match &cache {
            Some(cache) => {
                let connection = ConnectionSpec::Redis {
                    database_index: spec.cache.database_index,
                };
                let _ = distributor
                    .publish(&names.cache_url, &cache.endpoint, &connection, ledger)
                    .await;
            }
            None => ledger.record(
                Step::Secrets,
                SECRET_KIND,
                &names.cache_url,
                None,
                ReportStatus::Skipped("cache cluster unavailable".to_string()),
            ),
        }

        ObservabilityBootstrapper::new(self.control_plane.clone(), spec.observability.retention_days)
            .ensure(&self.config.log_sink_name(), ledger)
            .await;

        Ok(())
    }

    async fn publish_database_url(
        &self,
        distributor: &SecretDistributor,
        ctx: &ProvisioningContext,
        database: Option<&ManagedOutcome>,
        ledger: &mut RunLedger,
    ) {
        let names = ctx.secret_names();
        let Some(database) = database else {
            ledger.record(
                Step::Secrets,
                SECRET_KIND,
                &names.database_url,
                None,
                ReportStatus::Skipped("database instance unavailable".to_string()),
            );
            return;
        };
        if database.endpoint.resolvable().is_none() {
            distributor.defer(&names.database_url, ledger);
            return;
        }

        let password = match &database.fresh_credential {
            Some(fresh) => Some(fresh.clone()),
            None => distributor
                .recall_credential(&names.database_master_credential)
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "Could not recall database master credential");
                    None
                }),
        };
        let Some(password) = password else {
            ledger.record(
                Step::Secrets,
                SECRET_KIND,
                &names.database_url,
                None,
                ReportStatus::Failed(format!(
                    "master credential not found in {}",
                    names.database_master_credential
                )),
            );
            return;
        };

        let db = &self.config.spec.database;
        let connection = ConnectionSpec::Postgres {
            username: db.master_username.clone(),
            password,
            database: db.database_name.clone(),
        };
        let _ = distributor
            .publish(&names.database_url, &database.endpoint, &connection, ledger)
            .await;
    }

    async fn service_tier(&self, ledger: &mut RunLedger) -> Result<(), ProvisioningError> {
        let spec = &self.config.spec;
        let (account, network) = self.discover(ledger).await?;
        let boundaries = self.security_policy().lookup_existing(ledger).await?;
        let ctx = ProvisioningContext::new(&spec.project, &spec.region, account, network, boundaries);

        let edge = EdgeProvisioner::new(self.control_plane.clone(), spec.edge.clone(), spec.workload.port);
        let load_balancer = tolerate(edge.ensure_load_balancer(&ctx, ledger).await)?;
        let target_group = tolerate(edge.ensure_target_group(&ctx, ledger).await)?;
        match (&load_balancer, &target_group) {
            (Some(load_balancer), Some(target_group)) => {
                tolerate(edge.ensure_listener(&ctx, load_balancer, target_group, ledger).await)?;
            }
            _ => skip(ledger, Step::Edge, &ctx, ResourceKind::Listener, "load balancer or target group unavailable")?,
        }

        let workload = WorkloadProvisioner::new(
            self.control_plane.clone(),
            self.renderer.clone(),
            spec.workload.clone(),
        );
        let cluster = tolerate(workload.ensure_cluster(&ctx, ledger).await)?;
        let revision = tolerate(
            workload
                .register_definition(&ctx, &self.config.log_sink_name(), ledger)
                .await,
        )?;
        match (&cluster, &revision, &target_group) {
            (Some(cluster), Some(revision), Some(target_group)) => {
                tolerate(
                    workload
                        .ensure_service(&ctx, cluster, revision, target_group, ledger)
                        .await,
                )?;
            }
            _ => skip(
                ledger,
                Step::Workload,
                &ctx,
                ResourceKind::ManagedService,
                "cluster, definition or target group unavailable",
            )?,
        }

        Ok(())
    }
}

/// Resource failures are already in the ledger; only rejected credentials abort
fn tolerate<T>(result: Result<T, ProvisionFailure>) -> Result<Option<T>, ProvisioningError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ProvisionFailure::ControlPlane(ControlPlaneError::Unauthenticated(reason))) => {
            Err(ProvisioningError::Authentication(reason))
        }
        Err(_) => Ok(None),
    }
}

fn skip(
    ledger: &mut RunLedger,
    step: Step,
    ctx: &ProvisioningContext,
    kind: ResourceKind,
    reason: &str,
) -> Result<(), ProvisioningError> {
    let reference = ResourceRef {
        kind,
        name: ctx.name_for(kind)?,
    };
    warn!(kind = %kind, name = %reference.name, "Skipping: {}", reason);
    ledger.record_skipped(step, &reference, reason);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::CredentialSource;
    use crate::domain::report::{FatalClass, PhaseOutcome};
    use crate::domain::secret::Credential;
    use crate::infrastructure::descriptor_template::DescriptorTemplateEngine;
    use crate::infrastructure::in_memory::{InMemoryControlPlane, InMemorySecretStore};

    fn orchestrator(
        control_plane: &Arc<InMemoryControlPlane>,
        secret_store: &Arc<InMemorySecretStore>,
    ) -> Orchestrator {
        let mut config = StackConfigManifest::default();
        config.spec.project = "p".to_string();
        Orchestrator::new(
            control_plane.clone(),
            secret_store.clone(),
            Arc::new(DescriptorTemplateEngine::new()),
            Some(CallerCredentials {
                profile: "default".to_string(),
                token: Credential::new("token"),
                source: CredentialSource::Environment,
            }),
            config,
        )
    }

    #[tokio::test]
    async fn test_service_tier_requires_network_tier() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let secret_store = Arc::new(InMemorySecretStore::new());

        let report = orchestrator(&control_plane, &secret_store)
            .provision_service_tier()
            .await;

        assert_eq!(report.outcome(), PhaseOutcome::Aborted);
        assert_eq!(report.fatal.as_ref().map(|f| f.class), Some(FatalClass::Precondition));
        assert_eq!(control_plane.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_database_failure_does_not_stop_cache() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        control_plane.fail_create_for(ResourceKind::DatabaseInstance, "instance quota exceeded");
        let secret_store = Arc::new(InMemorySecretStore::new());

        let report = orchestrator(&control_plane, &secret_store)
            .provision_network_tier()
            .await;

        assert_eq!(report.outcome(), PhaseOutcome::CompletedWithFailures);
        assert_eq!(report.exit_code(), 4);
        assert!(matches!(
            report.entry("database-instance", "p-db").map(|e| &e.status),
            Some(ReportStatus::Failed(_))
        ));
        assert_eq!(
            report.entry("cache-cluster", "p-cache").map(|e| &e.status),
            Some(&ReportStatus::Pending)
        );
        assert!(matches!(
            report.entry("secret", "p/database-url").map(|e| &e.status),
            Some(ReportStatus::Skipped(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_credentials_abort_service_tier() {
        let control_plane = Arc::new(InMemoryControlPlane::with_default_network("acct-1"));
        let secret_store = Arc::new(InMemorySecretStore::new());
        let orchestrator = orchestrator(&control_plane, &secret_store);
        orchestrator.provision_network_tier().await;

        control_plane.reject_credentials();
        let report = orchestrator.provision_service_tier().await;
        assert_eq!(report.fatal.as_ref().map(|f| f.class), Some(FatalClass::Authentication));
    }
}
