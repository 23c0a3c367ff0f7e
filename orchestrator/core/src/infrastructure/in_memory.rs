// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Control Plane
//!
//! Thread-safe HashMap-backed implementations of [`ControlPlane`] and
//! [`SecretStore`], used by tests and by the CLI sandbox mode.
//!
//! # Behaviour
//!
//! - Duplicate creates are rejected with `AlreadyExists`, exactly like the
//!   real control plane, so create-or-get paths are exercised for real.
//! - Database instances and cache clusters start out `Creating`; everything
//!   else is `Available` immediately. [`InMemoryControlPlane::settle`] moves
//!   every pending resource to `Available`, standing in for time passing.
//! - Fault injection: [`InMemoryControlPlane::fail_create_for`] and
//!   [`InMemoryControlPlane::reject_credentials`].
//!
//! # Sandbox
//!
//! [`Sandbox`] persists both adapters to a JSON snapshot between CLI runs.
//! Pending resources settle when the snapshot is reloaded, so a second run
//! sees them available.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::context::AccountId;
use crate::domain::control_plane::{ControlPlane, ControlPlaneError, SecretStore, SecretStoreError};
use crate::domain::network::{Network, NetworkId, Subnet, SubnetId};
use crate::domain::resource::{
    DesiredSpec, HostPort, LogicalName, ResourceId, ResourceKind, ResourceRecord, ResourceState,
};
use crate::domain::secret::{Credential, SecretVersion};
use crate::domain::security::SecurityRule;
use crate::domain::workload::{DefinitionRevision, RegisteredDefinition, WorkloadDefinition};

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub network: Network,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    pub record: ResourceRecord,
    pub spec: DesiredSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRule {
    pub boundary: ResourceId,
    pub rule: SecurityRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneSnapshot {
    pub account: AccountId,
    #[serde(default)]
    pub networks: Vec<NetworkEntry>,
    #[serde(default)]
    pub resources: Vec<StoredResource>,
    #[serde(default)]
    pub rules: Vec<StoredRule>,
    #[serde(default)]
    pub definitions: Vec<RegisteredDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSecret {
    pub name: String,
    pub value: Credential,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretStoreSnapshot {
    #[serde(default)]
    pub secrets: Vec<StoredSecret>,
}

// ============================================================================
// Control Plane
// ============================================================================

struct ControlPlaneState {
    account: AccountId,
    networks: Vec<NetworkEntry>,
    resources: BTreeMap<(ResourceKind, LogicalName), StoredResource>,
    rules: BTreeMap<ResourceId, Vec<SecurityRule>>,
    definitions: BTreeMap<String, Vec<WorkloadDefinition>>,
    calls: Vec<String>,
    create_calls: usize,
    failures: HashMap<ResourceKind, String>,
    reject_credentials: bool,
}

#[derive(Clone)]
pub struct InMemoryControlPlane {
    state: Arc<RwLock<ControlPlaneState>>,
}

impl InMemoryControlPlane {
    /// Empty region: no networks, no resources
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ControlPlaneState {
                account: AccountId(account.into()),
                networks: Vec::new(),
                resources: BTreeMap::new(),
                rules: BTreeMap::new(),
                definitions: BTreeMap::new(),
                calls: Vec::new(),
                create_calls: 0,
                failures: HashMap::new(),
                reject_credentials: false,
            })),
        }
    }

    /// Default network with subnets `s1`, `s2`, `s3` and a route target
    pub fn with_default_network(account: impl Into<String>) -> Self {
        let control_plane = Self::new(account);
        let subnets = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(index, zone)| Subnet {
                id: SubnetId(format!("s{}", index + 1)),
                zone: Some(format!("zone-{}", zone)),
                cidr: Some(format!("10.0.{}.0/24", index)),
            })
            .collect();
        control_plane.add_network(
            Network {
                id: NetworkId("net-default".to_string()),
                is_default: true,
                cidr: Some("10.0.0.0/16".to_string()),
                default_route_target: Some("gw-default".to_string()),
            },
            subnets,
        );
        control_plane
    }

    pub fn add_network(&self, network: Network, subnets: Vec<Subnet>) {
        self.state.write().networks.push(NetworkEntry { network, subnets });
    }

    pub fn from_snapshot(snapshot: ControlPlaneSnapshot) -> Self {
        let control_plane = Self::new(snapshot.account.0);
        {
            let mut state = control_plane.state.write();
            state.networks = snapshot.networks;
            for stored in snapshot.resources {
                if stored.record.kind == ResourceKind::SecurityBoundary {
                    state.rules.entry(stored.record.id.clone()).or_default();
                }
                let key = (stored.record.kind, stored.record.name.clone());
                state.resources.insert(key, stored);
            }
            for stored in snapshot.rules {
                state.rules.entry(stored.boundary).or_default().push(stored.rule);
            }
            for registered in snapshot.definitions {
                state
                    .definitions
                    .entry(registered.revision.family)
                    .or_default()
                    .push(registered.definition);
            }
        }
        control_plane
    }

    pub fn snapshot(&self) -> ControlPlaneSnapshot {
        let state = self.state.read();
        ControlPlaneSnapshot {
            account: state.account.clone(),
            networks: state.networks.clone(),
            resources: state.resources.values().cloned().collect(),
            rules: state
                .rules
                .iter()
                .flat_map(|(boundary, rules)| {
                    rules.iter().map(|rule| StoredRule {
                        boundary: boundary.clone(),
                        rule: rule.clone(),
                    })
                })
                .collect(),
            definitions: state
                .definitions
                .iter()
                .flat_map(|(family, revisions)| {
                    revisions.iter().enumerate().map(|(index, definition)| RegisteredDefinition {
                        revision: DefinitionRevision {
                            family: family.clone(),
                            revision: index as u32 + 1,
                        },
                        definition: definition.clone(),
                    })
                })
                .collect(),
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.read().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.read().create_calls
    }

    pub fn reject_credentials(&self) {
        self.state.write().reject_credentials = true;
    }

    pub fn fail_create_for(&self, kind: ResourceKind, reason: impl Into<String>) {
        self.state.write().failures.insert(kind, reason.into());
    }

    pub fn resource_count(&self) -> usize {
        self.state.read().resources.len()
    }

    pub fn rule_count(&self) -> usize {
        self.state.read().rules.values().map(Vec::len).sum()
    }

    pub fn rules_for(&self, boundary: &ResourceId) -> Vec<SecurityRule> {
        self.state.read().rules.get(boundary).cloned().unwrap_or_default()
    }

    pub fn spec_of(&self, kind: ResourceKind, name: &LogicalName) -> Option<DesiredSpec> {
        self.state
            .read()
            .resources
            .get(&(kind, name.clone()))
            .map(|stored| stored.spec.clone())
    }

    pub fn latest_definition(&self, family: &str) -> Option<RegisteredDefinition> {
        let state = self.state.read();
        latest(&state.definitions, family)
    }

    /// Complete every asynchronous creation
    pub fn settle(&self) {
        let mut state = self.state.write();
        for stored in state.resources.values_mut() {
            if matches!(stored.record.state, ResourceState::Creating | ResourceState::Pending) {
                stored.record.state = ResourceState::Available;
            }
        }
    }

    pub fn mark_available(&self, kind: ResourceKind, name: &LogicalName) -> bool {
        let mut state = self.state.write();
        match state.resources.get_mut(&(kind, name.clone())) {
            Some(stored) => {
                stored.record.state = ResourceState::Available;
                true
            }
            None => false,
        }
    }

    fn enter(&self, call: impl Into<String>) -> Result<(), ControlPlaneError> {
        let mut state = self.state.write();
        state.calls.push(call.into());
        if state.reject_credentials {
            return Err(ControlPlaneError::Unauthenticated("token rejected".to_string()));
        }
        Ok(())
    }
}

fn latest(definitions: &BTreeMap<String, Vec<WorkloadDefinition>>, family: &str) -> Option<RegisteredDefinition> {
    let revisions = definitions.get(family)?;
    let definition = revisions.last()?;
    Some(RegisteredDefinition {
        revision: DefinitionRevision {
            family: family.to_string(),
            revision: revisions.len() as u32,
        },
        definition: definition.clone(),
    })
}

fn new_record(kind: ResourceKind, name: &LogicalName, spec: &DesiredSpec) -> ResourceRecord {
    let suffix = Uuid::new_v4().simple().to_string();
    let id = ResourceId::new(format!("{}-{}", kind.as_str(), &suffix[..12]));

    let host = format!("{}.{}.internal", name, kind.as_str());
    let address = match spec {
        DesiredSpec::DatabaseInstance(db) => Some(HostPort { host, port: db.port }),
        DesiredSpec::CacheCluster(cache) => Some(HostPort {
            host,
            port: cache.port,
        }),
        _ => None,
    };

    let mut attributes = BTreeMap::new();
    if kind == ResourceKind::LoadBalancer {
        attributes.insert("dns_name".to_string(), format!("{}.edge.internal", name));
    }

    let state = if kind.is_managed_stateful() {
        ResourceState::Creating
    } else {
        ResourceState::Available
    };

    ResourceRecord {
        kind,
        name: name.clone(),
        id,
        state,
        address,
        attributes,
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn caller_identity(&self) -> Result<AccountId, ControlPlaneError> {
        self.enter("caller_identity")?;
        Ok(self.state.read().account.clone())
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError> {
        self.enter("list_networks")?;
        Ok(self
            .state
            .read()
            .networks
            .iter()
            .map(|entry| entry.network.clone())
            .collect())
    }

    async fn list_subnets(&self, network: &NetworkId) -> Result<Vec<Subnet>, ControlPlaneError> {
        self.enter(format!("list_subnets {}", network))?;
        Ok(self
            .state
            .read()
            .networks
            .iter()
            .find(|entry| &entry.network.id == network)
            .map(|entry| entry.subnets.clone())
            .unwrap_or_default())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
        spec: &DesiredSpec,
    ) -> Result<ResourceRecord, ControlPlaneError> {
        self.enter(format!("create {} {}", kind, name))?;
        let mut state = self.state.write();
        state.create_calls += 1;

        if let Some(reason) = state.failures.get(&kind) {
            return Err(ControlPlaneError::Rejected {
                status: 400,
                reason: reason.clone(),
            });
        }
        let key = (kind, name.clone());
        if state.resources.contains_key(&key) {
            return Err(ControlPlaneError::already_exists(kind, name));
        }

        let record = new_record(kind, name, spec);
        debug!(kind = %kind, name = %name, id = %record.id, "In-memory create");
        if kind == ResourceKind::SecurityBoundary {
            state.rules.entry(record.id.clone()).or_default();
        }
        state.resources.insert(
            key,
            StoredResource {
                record: record.clone(),
                spec: spec.clone(),
            },
        );
        Ok(record)
    }

    async fn describe(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
    ) -> Result<Option<ResourceRecord>, ControlPlaneError> {
        self.enter(format!("describe {} {}", kind, name))?;
        Ok(self
            .state
            .read()
            .resources
            .get(&(kind, name.clone()))
            .map(|stored| stored.record.clone()))
    }

    async fn add_rule(&self, boundary: &ResourceId, rule: &SecurityRule) -> Result<(), ControlPlaneError> {
        self.enter(format!("add_rule {} {}", boundary, rule))?;
        let mut state = self.state.write();
        let rules = state.rules.get_mut(boundary).ok_or_else(|| ControlPlaneError::NotFound {
            kind: ResourceKind::SecurityBoundary.to_string(),
            name: boundary.to_string(),
        })?;
        if rules.contains(rule) {
            return Err(ControlPlaneError::already_exists("security-rule", rule));
        }
        rules.push(rule.clone());
        Ok(())
    }

    async fn register_workload_definition(
        &self,
        definition: &WorkloadDefinition,
    ) -> Result<DefinitionRevision, ControlPlaneError> {
        self.enter(format!("register_workload_definition {}", definition.family))?;
        let mut state = self.state.write();
        if let Some(reason) = state.failures.get(&ResourceKind::WorkloadDefinition) {
            return Err(ControlPlaneError::Rejected {
                status: 400,
                reason: reason.clone(),
            });
        }
        let revisions = state.definitions.entry(definition.family.clone()).or_default();
        revisions.push(definition.clone());
        Ok(DefinitionRevision {
            family: definition.family.clone(),
            revision: revisions.len() as u32,
        })
    }

    async fn latest_workload_definition(
        &self,
        family: &str,
    ) -> Result<Option<RegisteredDefinition>, ControlPlaneError> {
        self.enter(format!("latest_workload_definition {}", family))?;
        let state = self.state.read();
        Ok(latest(&state.definitions, family))
    }
}

// ============================================================================
// Secret Store
// ============================================================================

#[derive(Default)]
struct SecretStoreState {
    secrets: BTreeMap<String, StoredSecret>,
    writes: usize,
}

#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    state: Arc<RwLock<SecretStoreState>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SecretStoreSnapshot) -> Self {
        let store = Self::new();
        store.state.write().secrets = snapshot
            .secrets
            .into_iter()
            .map(|secret| (secret.name.clone(), secret))
            .collect();
        store
    }

    pub fn snapshot(&self) -> SecretStoreSnapshot {
        SecretStoreSnapshot {
            secrets: self.state.read().secrets.values().cloned().collect(),
        }
    }

    /// Creates and updates issued so far
    pub fn write_count(&self) -> usize {
        self.state.read().writes
    }

    pub fn secret_count(&self) -> usize {
        self.state.read().secrets.len()
    }

    pub fn value(&self, name: &str) -> Option<Credential> {
        self.state.read().secrets.get(name).map(|secret| secret.value.clone())
    }

    pub fn version_of(&self, name: &str) -> Option<u32> {
        self.state.read().secrets.get(name).map(|secret| secret.version)
    }
}

fn version(number: u32) -> SecretVersion {
    SecretVersion(format!("v{}", number))
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn create(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError> {
        let mut state = self.state.write();
        if state.secrets.contains_key(name) {
            return Err(SecretStoreError::AlreadyExists(name.to_string()));
        }
        state.writes += 1;
        state.secrets.insert(
            name.to_string(),
            StoredSecret {
                name: name.to_string(),
                value: value.clone(),
                version: 1,
            },
        );
        Ok(version(1))
    }

    async fn update(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let secret = state
            .secrets
            .get_mut(name)
            .ok_or_else(|| SecretStoreError::NotFound(name.to_string()))?;
        secret.value = value.clone();
        secret.version += 1;
        state.writes += 1;
        Ok(version(secret.version))
    }

    async fn get(&self, name: &str) -> Result<Option<Credential>, SecretStoreError> {
        Ok(self.value(name))
    }
}

// ============================================================================
// Sandbox
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSnapshot {
    pub control_plane: ControlPlaneSnapshot,
    #[serde(default)]
    pub secret_store: SecretStoreSnapshot,
}

/// In-memory adapters persisted to a JSON file between runs
pub struct Sandbox {
    path: PathBuf,
    pub control_plane: Arc<InMemoryControlPlane>,
    pub secret_store: Arc<InMemorySecretStore>,
}

pub const SANDBOX_ACCOUNT: &str = "sandbox";

impl Sandbox {
    /// Load the snapshot at `path`, or seed a fresh sandbox when absent
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!(path = %path.display(), "Seeding new sandbox");
            return Ok(Self {
                path,
                control_plane: Arc::new(InMemoryControlPlane::with_default_network(SANDBOX_ACCOUNT)),
                secret_store: Arc::new(InMemorySecretStore::new()),
            });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sandbox file: {:?}", path))?;
        let snapshot: SandboxSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sandbox file: {:?}", path))?;

        let control_plane = InMemoryControlPlane::from_snapshot(snapshot.control_plane);
        control_plane.settle();
        info!(path = %path.display(), resources = control_plane.resource_count(), "Loaded sandbox");

        Ok(Self {
            path,
            control_plane: Arc::new(control_plane),
            secret_store: Arc::new(InMemorySecretStore::from_snapshot(snapshot.secret_store)),
        })
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = SandboxSnapshot {
            control_plane: self.control_plane.snapshot(),
            secret_store: self.secret_store.snapshot(),
        };
        let content = serde_json::to_string_pretty(&snapshot).context("Failed to serialize sandbox")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create sandbox directory: {:?}", parent))?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write sandbox file: {:?}", self.path))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::security::RuleSource;

    fn boundary_spec() -> DesiredSpec {
        DesiredSpec::SecurityBoundary {
            tier: crate::domain::security::Tier::Edge,
            network_id: NetworkId("net-default".to_string()),
            description: "edge".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_create_is_already_exists() {
        let control_plane = InMemoryControlPlane::with_default_network("acct-1");
        let name = LogicalName::from_existing("p-edge-boundary");

        control_plane
            .create(ResourceKind::SecurityBoundary, &name, &boundary_spec())
            .await
            .unwrap();
        let err = control_plane
            .create(ResourceKind::SecurityBoundary, &name, &boundary_spec())
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(control_plane.create_calls(), 2);
        assert_eq!(control_plane.resource_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rule_is_already_exists() {
        let control_plane = InMemoryControlPlane::with_default_network("acct-1");
        let record = control_plane
            .create(
                ResourceKind::SecurityBoundary,
                &LogicalName::from_existing("p-edge-boundary"),
                &boundary_spec(),
            )
            .await
            .unwrap();
        let rule = SecurityRule::tcp(80, RuleSource::Cidr("0.0.0.0/0".to_string()));

        control_plane.add_rule(&record.id, &rule).await.unwrap();
        assert!(control_plane.add_rule(&record.id, &rule).await.unwrap_err().is_already_exists());
        assert!(matches!(
            control_plane.add_rule(&ResourceId::new("missing"), &rule).await,
            Err(ControlPlaneError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_update_requires_existing() {
        let store = InMemorySecretStore::new();
        let value = Credential::new("v");

        assert!(matches!(
            store.update("p/x", &value).await,
            Err(SecretStoreError::NotFound(_))
        ));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.create("p/x", &value).await.unwrap(), SecretVersion("v1".to_string()));
        assert!(matches!(
            store.create("p/x", &value).await,
            Err(SecretStoreError::AlreadyExists(_))
        ));
        assert_eq!(store.update("p/x", &value).await.unwrap(), SecretVersion("v2".to_string()));
        assert_eq!(store.version_of("p/x"), Some(2));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_sandbox_round_trip_settles_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sandbox.json");

        let sandbox = Sandbox::open(&path).unwrap();
        let name = LogicalName::from_existing("p-cache");
        let spec = DesiredSpec::CacheCluster(crate::domain::resource::CacheSpec {
            engine: "redis".to_string(),
            node_type: "cache.t3.micro".to_string(),
            node_count: 1,
            port: 6379,
            subnet_group: LogicalName::from_existing("p-cache-subnets"),
            boundary_id: ResourceId::new("b-1"),
        });
        let created = sandbox
            .control_plane
            .create(ResourceKind::CacheCluster, &name, &spec)
            .await
            .unwrap();
        assert_eq!(created.state, ResourceState::Creating);
        sandbox.secret_store.create("p/secret-key", &Credential::new("k")).await.unwrap();
        sandbox.save().unwrap();

        let reopened = Sandbox::open(&path).unwrap();
        let described = reopened
            .control_plane
            .describe(ResourceKind::CacheCluster, &name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(described.id, created.id);
        assert_eq!(described.state, ResourceState::Available);
        assert_eq!(reopened.secret_store.value("p/secret-key"), Some(Credential::new("k")));
    }
}
