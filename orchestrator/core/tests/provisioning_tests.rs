// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end provisioning runs against the in-memory control plane.
//!
//! Each test drives the orchestrator through one or more invocations of a
//! phase, settling asynchronous resources between runs the way an operator's
//! re-run would observe them.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use stackup_core::application::Orchestrator;
use stackup_core::domain::context::{AccountId, CallerCredentials, CredentialSource};
use stackup_core::domain::control_plane::{ControlPlane, ControlPlaneError, SecretStore};
use stackup_core::domain::network::{Network, NetworkId, Subnet, SubnetId};
use stackup_core::domain::report::{FatalClass, PhaseOutcome, ReportStatus};
use stackup_core::domain::resource::{
    DatabaseSpec, DesiredSpec, LogicalName, ResourceId, ResourceKind, ResourceRecord,
};
use stackup_core::domain::secret::Credential;
use stackup_core::domain::security::SecurityRule;
use stackup_core::domain::workload::{DefinitionRevision, RegisteredDefinition, WorkloadDefinition};
use stackup_core::domain::stack_config::StackConfigManifest;
use stackup_core::infrastructure::descriptor_template::DescriptorTemplateEngine;
use stackup_core::infrastructure::{InMemoryControlPlane, InMemorySecretStore};

const ACCOUNT: &str = "123456789012";

fn subnet(id: &str) -> Subnet {
    Subnet {
        id: SubnetId(id.to_string()),
        zone: None,
        cidr: None,
    }
}

fn network_with_subnets(ids: &[&str]) -> InMemoryControlPlane {
    let control_plane = InMemoryControlPlane::new(ACCOUNT);
    control_plane.add_network(
        Network {
            id: NetworkId("net-1".to_string()),
            is_default: true,
            cidr: None,
            default_route_target: Some("gw-1".to_string()),
        },
        ids.iter().map(|id| subnet(id)).collect(),
    );
    control_plane
}

struct Harness {
    control_plane: Arc<InMemoryControlPlane>,
    secret_store: Arc<InMemorySecretStore>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(control_plane: InMemoryControlPlane) -> Self {
        let control_plane = Arc::new(control_plane);
        let secret_store = Arc::new(InMemorySecretStore::new());
        Self::with_port(control_plane.clone(), secret_store, control_plane)
    }

    /// Drive the orchestrator through `port` while inspecting the backing store
    fn with_port(
        control_plane: Arc<InMemoryControlPlane>,
        secret_store: Arc<InMemorySecretStore>,
        port: Arc<dyn ControlPlane>,
    ) -> Self {
        let mut config = StackConfigManifest::default();
        config.spec.project = "notes".to_string();
        let orchestrator = Orchestrator::new(
            port,
            secret_store.clone(),
            Arc::new(DescriptorTemplateEngine::new()),
            Some(CallerCredentials {
                profile: "default".to_string(),
                token: Credential::new("test-token"),
                source: CredentialSource::Environment,
            }),
            config,
        );
        Self {
            control_plane,
            secret_store,
            orchestrator,
        }
    }

    fn creates_of(&self, kind: ResourceKind) -> usize {
        let prefix = format!("create {} ", kind);
        self.control_plane
            .calls()
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }
}

fn status<'a>(report: &'a stackup_core::domain::report::ProvisioningReport, kind: &str, name: &str) -> &'a ReportStatus {
    &report
        .entry(kind, name)
        .unwrap_or_else(|| panic!("no report entry for {} {}", kind, name))
        .status
}

#[tokio::test]
async fn test_fresh_account_first_run_defers_then_second_run_publishes() {
    let harness = Harness::new(network_with_subnets(&["s1", "s2"]));

    let first = harness.orchestrator.provision_network_tier().await;

    assert_eq!(first.outcome(), PhaseOutcome::Partial);
    assert_eq!(first.exit_code(), 3);
    // boundaries, rules, subnet groups, log sink; database and cache are still pending
    assert_eq!(first.count("created"), 4 + 5 + 2 + 1);
    assert_eq!(status(&first, "database-instance", "notes-db"), &ReportStatus::Pending);
    assert_eq!(status(&first, "cache-cluster", "notes-cache"), &ReportStatus::Pending);
    assert_eq!(status(&first, "secret", "notes/secret-key"), &ReportStatus::Published);
    assert!(matches!(status(&first, "secret", "notes/database-url"), ReportStatus::Deferred(_)));
    assert!(matches!(status(&first, "secret", "notes/redis-url"), ReportStatus::Deferred(_)));
    assert_eq!(status(&first, "log-sink", "notes-logs"), &ReportStatus::Created);
    assert!(harness.secret_store.value("notes/database-url").is_none());
    assert!(harness.secret_store.value("notes/redis-url").is_none());

    harness.control_plane.settle();
    let second = harness.orchestrator.provision_network_tier().await;

    assert_eq!(second.outcome(), PhaseOutcome::Complete);
    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.count("created"), 0);
    assert_eq!(second.count("reused"), 4 + 5 + 2 + 2 + 1);
    assert_eq!(status(&second, "secret", "notes/database-url"), &ReportStatus::Published);
    assert_eq!(status(&second, "secret", "notes/redis-url"), &ReportStatus::Published);

    let password = harness
        .secret_store
        .value("notes/database-master-credential")
        .expect("master credential stored on the creating run");
    assert_eq!(
        harness.secret_store.value("notes/database-url").unwrap().expose(),
        format!(
            "postgresql://notes_admin:{}@notes-db.database-instance.internal:5432/shared_notes",
            password.expose()
        )
    );
    assert_eq!(
        harness.secret_store.value("notes/redis-url").unwrap().expose(),
        "redis://notes-cache.cache-cluster.internal:6379/0"
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));

    harness.orchestrator.provision_network_tier().await;
    let before = harness.control_plane.snapshot();
    harness.orchestrator.provision_network_tier().await;
    let after = harness.control_plane.snapshot();

    let ids = |snapshot: &stackup_core::infrastructure::in_memory::ControlPlaneSnapshot| {
        snapshot
            .resources
            .iter()
            .map(|stored| (stored.record.name.clone(), stored.record.id.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
    assert_eq!(harness.control_plane.rule_count(), 5);
    assert_eq!(harness.creates_of(ResourceKind::DatabaseInstance), 1);
    assert_eq!(harness.creates_of(ResourceKind::CacheCluster), 1);
}

#[tokio::test]
async fn test_network_failure_stops_every_later_step() {
    let harness = Harness::new(InMemoryControlPlane::new(ACCOUNT));

    let report = harness.orchestrator.provision_network_tier().await;

    assert_eq!(report.outcome(), PhaseOutcome::Aborted);
    assert_eq!(report.fatal.as_ref().map(|f| f.class), Some(FatalClass::Precondition));
    assert_eq!(harness.control_plane.create_calls(), 0);
    assert_eq!(harness.control_plane.rule_count(), 0);
    assert_eq!(harness.secret_store.write_count(), 0);
}

#[tokio::test]
async fn test_zero_subnets_aborts_before_any_create() {
    let harness = Harness::new(network_with_subnets(&[]));

    let report = harness.orchestrator.provision_network_tier().await;

    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.fatal.as_ref().map(|f| f.class), Some(FatalClass::Precondition));
    assert_eq!(harness.control_plane.create_calls(), 0);
}

#[tokio::test]
async fn test_single_subnet_is_not_enough() {
    let harness = Harness::new(network_with_subnets(&["s1"]));

    let report = harness.orchestrator.provision_network_tier().await;

    assert_eq!(report.outcome(), PhaseOutcome::Aborted);
    assert_eq!(harness.control_plane.create_calls(), 0);
}

#[tokio::test]
async fn test_secret_written_once_available_then_updated() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));

    harness.orchestrator.provision_network_tier().await;
    assert_eq!(harness.secret_store.version_of("notes/redis-url"), None);

    harness.control_plane.settle();
    harness.orchestrator.provision_network_tier().await;
    assert_eq!(harness.secret_store.version_of("notes/redis-url"), Some(1));

    let third = harness.orchestrator.provision_network_tier().await;
    assert_eq!(status(&third, "secret", "notes/redis-url"), &ReportStatus::Updated);
    assert_eq!(status(&third, "secret", "notes/database-url"), &ReportStatus::Updated);
    assert_eq!(harness.secret_store.version_of("notes/redis-url"), Some(2));
    assert_eq!(harness.secret_store.secret_count(), 4);
}

#[tokio::test]
async fn test_signing_key_survives_reruns() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));

    harness.orchestrator.provision_network_tier().await;
    let key = harness.secret_store.value("notes/secret-key").unwrap();
    harness.orchestrator.provision_network_tier().await;

    assert_eq!(harness.secret_store.value("notes/secret-key"), Some(key));
}

#[tokio::test]
async fn test_duplicate_rules_are_never_fatal() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));

    harness.orchestrator.provision_network_tier().await;
    let second = harness.orchestrator.provision_network_tier().await;

    assert!(second.fatal.is_none());
    let rules: Vec<_> = second
        .entries
        .iter()
        .filter(|entry| entry.kind == "security-rule")
        .collect();
    assert_eq!(rules.len(), 5);
    assert!(rules.iter().all(|entry| entry.status == ReportStatus::Reused));
}

#[tokio::test]
async fn test_first_two_subnets_selected_on_every_run() {
    let harness = Harness::new(network_with_subnets(&["s1", "s2", "s3"]));

    for _ in 0..2 {
        let report = harness.orchestrator.provision_network_tier().await;
        assert!(report.entry("subnet", "s1").is_some());
        assert!(report.entry("subnet", "s2").is_some());
        assert!(report.entry("subnet", "s3").is_none());
    }

    match harness
        .control_plane
        .spec_of(ResourceKind::DatabaseSubnetGroup, &LogicalName::from_existing("notes-db-subnets"))
    {
        Some(DesiredSpec::SubnetGroup { subnet_ids, .. }) => assert_eq!(
            subnet_ids,
            vec![SubnetId("s1".to_string()), SubnetId("s2".to_string())]
        ),
        other => panic!("unexpected subnet group spec: {:?}", other),
    }
}

#[tokio::test]
async fn test_service_tier_after_network_tier() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    harness.orchestrator.provision_network_tier().await;
    harness.control_plane.settle();

    let first = harness.orchestrator.provision_service_tier().await;

    assert_eq!(first.outcome(), PhaseOutcome::Complete, "{:?}", first.entries);
    for (kind, name) in [
        ("load-balancer", "notes-lb"),
        ("target-group", "notes-tg"),
        ("listener", "notes-listener"),
        ("container-cluster", "notes-cluster"),
        ("workload-definition", "notes-task"),
        ("managed-service", "notes-service"),
    ] {
        assert_eq!(status(&first, kind, name), &ReportStatus::Created, "{} {}", kind, name);
    }

    let second = harness.orchestrator.provision_service_tier().await;
    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.count("created"), 0);
    assert_eq!(status(&second, "workload-definition", "notes-task"), &ReportStatus::Reused);
    assert_eq!(
        harness.control_plane.latest_definition("notes-task").map(|d| d.revision.revision),
        Some(1)
    );
}

#[tokio::test]
async fn test_listener_failure_leaves_workload_untouched() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    harness.orchestrator.provision_network_tier().await;
    harness.control_plane.fail_create_for(ResourceKind::Listener, "listener quota exceeded");

    let report = harness.orchestrator.provision_service_tier().await;

    assert_eq!(report.outcome(), PhaseOutcome::CompletedWithFailures);
    assert!(matches!(status(&report, "listener", "notes-listener"), ReportStatus::Failed(_)));
    assert_eq!(status(&report, "managed-service", "notes-service"), &ReportStatus::Created);
}

#[tokio::test]
async fn test_target_group_failure_skips_dependents() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    harness.orchestrator.provision_network_tier().await;
    harness.control_plane.fail_create_for(ResourceKind::TargetGroup, "invalid health check");

    let report = harness.orchestrator.provision_service_tier().await;

    assert_eq!(report.exit_code(), 4);
    assert!(matches!(status(&report, "listener", "notes-listener"), ReportStatus::Skipped(_)));
    assert!(matches!(status(&report, "managed-service", "notes-service"), ReportStatus::Skipped(_)));
    assert_eq!(harness.creates_of(ResourceKind::ManagedService), 0);
}

#[tokio::test]
async fn test_missing_credentials_abort_before_any_call() {
    let control_plane = Arc::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    let orchestrator = Orchestrator::new(
        control_plane.clone(),
        Arc::new(InMemorySecretStore::new()),
        Arc::new(DescriptorTemplateEngine::new()),
        None,
        StackConfigManifest::default(),
    );

    let report = orchestrator.provision_network_tier().await;

    assert_eq!(report.fatal.as_ref().map(|f| f.class), Some(FatalClass::Authentication));
    assert!(control_plane.calls().is_empty());
}

/// Another invocation creates the database (and stores its password) just
/// before this run's create reaches the control plane.
struct ConcurrentDatabaseCreate {
    inner: Arc<InMemoryControlPlane>,
    secret_store: Arc<InMemorySecretStore>,
    winner_password: &'static str,
    raced: Mutex<bool>,
}

#[async_trait]
impl ControlPlane for ConcurrentDatabaseCreate {
    async fn caller_identity(&self) -> Result<AccountId, ControlPlaneError> {
        self.inner.caller_identity().await
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError> {
        self.inner.list_networks().await
    }

    async fn list_subnets(&self, network: &NetworkId) -> Result<Vec<Subnet>, ControlPlaneError> {
        self.inner.list_subnets(network).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
        spec: &DesiredSpec,
    ) -> Result<ResourceRecord, ControlPlaneError> {
        if let DesiredSpec::DatabaseInstance(database) = spec {
            let already_raced = std::mem::replace(&mut *self.raced.lock(), true);
            if !already_raced {
                let winner = Credential::new(self.winner_password);
                let winning_spec = DesiredSpec::DatabaseInstance(DatabaseSpec {
                    master_password: winner.clone(),
                    ..database.clone()
                });
                self.inner.create(kind, name, &winning_spec).await?;
                self.secret_store
                    .create("notes/database-master-credential", &winner)
                    .await
                    .expect("winner stores its credential");
            }
        }
        self.inner.create(kind, name, spec).await
    }

    async fn describe(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
    ) -> Result<Option<ResourceRecord>, ControlPlaneError> {
        self.inner.describe(kind, name).await
    }

    async fn add_rule(&self, boundary: &ResourceId, rule: &SecurityRule) -> Result<(), ControlPlaneError> {
        self.inner.add_rule(boundary, rule).await
    }

    async fn register_workload_definition(
        &self,
        definition: &WorkloadDefinition,
    ) -> Result<DefinitionRevision, ControlPlaneError> {
        self.inner.register_workload_definition(definition).await
    }

    async fn latest_workload_definition(
        &self,
        family: &str,
    ) -> Result<Option<RegisteredDefinition>, ControlPlaneError> {
        self.inner.latest_workload_definition(family).await
    }
}

#[tokio::test]
async fn test_losing_database_create_keeps_winner_credential() {
    let inner = Arc::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    let secret_store = Arc::new(InMemorySecretStore::new());
    let racing = Arc::new(ConcurrentDatabaseCreate {
        inner: inner.clone(),
        secret_store: secret_store.clone(),
        winner_password: "WinnerPassword0001",
        raced: Mutex::new(false),
    });
    let harness = Harness::with_port(inner, secret_store, racing);

    let first = harness.orchestrator.provision_network_tier().await;
    assert_eq!(status(&first, "database-instance", "notes-db"), &ReportStatus::Pending);

    harness.control_plane.settle();
    let second = harness.orchestrator.provision_network_tier().await;

    let stored = harness
        .control_plane
        .spec_of(ResourceKind::DatabaseInstance, &LogicalName::from_existing("notes-db"));
    let Some(DesiredSpec::DatabaseInstance(database)) = stored else {
        panic!("database instance missing");
    };
    assert_eq!(database.master_password.expose(), "WinnerPassword0001");
    assert_eq!(
        harness
            .secret_store
            .value("notes/database-master-credential")
            .map(|c| c.expose().to_string()),
        Some("WinnerPassword0001".to_string())
    );
    assert_eq!(status(&second, "secret", "notes/database-url"), &ReportStatus::Published);
    assert!(harness
        .secret_store
        .value("notes/database-url")
        .unwrap()
        .expose()
        .starts_with("postgresql://notes_admin:WinnerPassword0001@"));
}

#[tokio::test]
async fn test_subnet_group_failure_reports_managed_resource_as_skipped() {
    let harness = Harness::new(InMemoryControlPlane::with_default_network(ACCOUNT));
    harness
        .control_plane
        .fail_create_for(ResourceKind::DatabaseSubnetGroup, "subnet group quota exceeded");

    let report = harness.orchestrator.provision_network_tier().await;

    assert!(matches!(
        status(&report, "database-subnet-group", "notes-db-subnets"),
        ReportStatus::Failed(_)
    ));
    assert!(matches!(
        status(&report, "database-instance", "notes-db"),
        ReportStatus::Skipped(_)
    ));
    assert!(matches!(status(&report, "secret", "notes/database-url"), ReportStatus::Skipped(_)));
    assert_eq!(status(&report, "cache-cluster", "notes-cache"), &ReportStatus::Pending);
    assert_eq!(harness.creates_of(ResourceKind::DatabaseInstance), 0);
}
