// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Resource Identity and Lifecycle
//!
//! Value objects shared by every provisioning component:
//!
//! - [`ResourceKind`] - taxonomy of control-plane resources this orchestrator manages
//! - [`LogicalName`] - deterministic idempotency key derived from the project prefix
//! - [`ResourceState`] - `Absent → Creating → Pending → Available`, or `Failed`
//! - [`ResourceRecord`] - what the control plane reports about one resource
//! - [`ResourceDescriptor`] - desired resource plus its dependencies, built fresh each run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::endpoint::{Endpoint, Readiness};
use crate::domain::network::{NetworkId, SubnetId};
use crate::domain::security::Tier;
use crate::domain::secret::Credential;
use crate::domain::workload::HealthCheck;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    SecurityBoundary,
    DatabaseSubnetGroup,
    DatabaseInstance,
    CacheSubnetGroup,
    CacheCluster,
    LogSink,
    LoadBalancer,
    TargetGroup,
    Listener,
    ContainerCluster,
    WorkloadDefinition,
    ManagedService,
}

impl ResourceKind {
    /// Path segment used by the control-plane API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityBoundary => "security-boundary",
            Self::DatabaseSubnetGroup => "database-subnet-group",
            Self::DatabaseInstance => "database-instance",
            Self::CacheSubnetGroup => "cache-subnet-group",
            Self::CacheCluster => "cache-cluster",
            Self::LogSink => "log-sink",
            Self::LoadBalancer => "load-balancer",
            Self::TargetGroup => "target-group",
            Self::Listener => "listener",
            Self::ContainerCluster => "container-cluster",
            Self::WorkloadDefinition => "workload-definition",
            Self::ManagedService => "managed-service",
        }
    }

    /// Suffix appended to the project prefix when deriving a logical name
    fn name_suffix(&self) -> &'static str {
        match self {
            Self::SecurityBoundary => "boundary",
            Self::DatabaseSubnetGroup => "db-subnets",
            Self::DatabaseInstance => "db",
            Self::CacheSubnetGroup => "cache-subnets",
            Self::CacheCluster => "cache",
            Self::LogSink => "logs",
            Self::LoadBalancer => "lb",
            Self::TargetGroup => "tg",
            Self::Listener => "listener",
            Self::ContainerCluster => "cluster",
            Self::WorkloadDefinition => "task",
            Self::ManagedService => "service",
        }
    }

    /// Creation completes asynchronously on the control plane
    pub fn is_managed_stateful(&self) -> bool {
        matches!(self, Self::DatabaseInstance | Self::CacheCluster)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("project prefix cannot be empty")]
    EmptyPrefix,

    #[error("project prefix '{0}' must contain only lowercase letters, digits and hyphens")]
    InvalidPrefix(String),

    #[error("logical name '{0}' exceeds 63 characters")]
    TooLong(String),
}

/// Deterministic resource name; the idempotency key across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalName(String);

impl LogicalName {
    /// `{prefix}-{kind suffix}`
    pub fn derive(prefix: &str, kind: ResourceKind) -> Result<Self, NameError> {
        Self::build(prefix, &[kind.name_suffix()])
    }

    /// `{prefix}-{qualifier}-{kind suffix}`, for kinds with one instance per tier
    pub fn derive_qualified(
        prefix: &str,
        kind: ResourceKind,
        qualifier: &str,
    ) -> Result<Self, NameError> {
        Self::build(prefix, &[qualifier, kind.name_suffix()])
    }

    fn build(prefix: &str, parts: &[&str]) -> Result<Self, NameError> {
        validate_prefix(prefix)?;
        let mut name = prefix.to_string();
        for part in parts {
            name.push('-');
            name.push_str(part);
        }
        if name.len() > 63 {
            return Err(NameError::TooLong(name));
        }
        Ok(Self(name))
    }

    /// Wrap a name the control plane already knows (lookups, snapshots)
    pub fn from_existing(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_prefix(prefix: &str) -> Result<(), NameError> {
    if prefix.is_empty() {
        return Err(NameError::EmptyPrefix);
    }
    let valid = prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !prefix.starts_with('-')
        && !prefix.ends_with('-');
    if !valid {
        return Err(NameError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Identifier assigned by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Absent,
    Creating,
    Pending,
    Available,
    Failed,
}

impl ResourceState {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Exists on the control plane and can be referenced by dependents
    pub fn is_reusable(&self) -> bool {
        matches!(self, Self::Creating | Self::Pending | Self::Available)
    }

    pub fn readiness(&self) -> Readiness {
        if self.is_available() {
            Readiness::Available
        } else {
            Readiness::Pending
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// `(kind, name)` pair used to express dependencies
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: LogicalName,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// What the control plane reports about an existing resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: LogicalName,
    pub id: ResourceId,
    pub state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<HostPort>,
    /// Kind-specific extras, e.g. `dns_name` for load balancers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Endpoint view; a missing address is never reported as available.
    pub fn endpoint(&self) -> Endpoint {
        match &self.address {
            Some(address) if self.state.is_available() => Endpoint::available(address.clone()),
            Some(address) => Endpoint::pending(Some(address.clone())),
            None => Endpoint::pending(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

// ============================================================================
// Desired State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    pub instance_class: String,
    pub storage_gb: u32,
    pub multi_zone: bool,
    pub encrypted: bool,
    pub port: u16,
    pub database_name: String,
    pub master_username: String,
    pub master_password: Credential,
    pub subnet_group: LogicalName,
    pub boundary_id: ResourceId,
    pub backup_retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSpec {
    pub engine: String,
    pub node_type: String,
    pub node_count: u32,
    pub port: u16,
    pub subnet_group: LogicalName,
    pub boundary_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub cluster_id: ResourceId,
    pub definition_id: String,
    pub desired_count: u32,
    pub subnet_ids: Vec<SubnetId>,
    pub boundary_id: ResourceId,
    pub assign_public_ip: bool,
    pub target_group_id: ResourceId,
    pub container_name: String,
    pub container_port: u16,
    pub health_check_grace_seconds: u32,
}

/// Kind-specific create payload sent to the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DesiredSpec {
    SecurityBoundary {
        tier: Tier,
        network_id: NetworkId,
        description: String,
    },
    SubnetGroup {
        subnet_ids: Vec<SubnetId>,
        description: String,
    },
    DatabaseInstance(DatabaseSpec),
    CacheCluster(CacheSpec),
    LogSink {
        retention_days: u32,
    },
    LoadBalancer {
        subnet_ids: Vec<SubnetId>,
        boundary_id: ResourceId,
        internet_facing: bool,
    },
    TargetGroup {
        network_id: NetworkId,
        protocol: String,
        port: u16,
        health_check: HealthCheck,
    },
    Listener {
        load_balancer_id: ResourceId,
        target_group_id: ResourceId,
        protocol: String,
        port: u16,
    },
    ContainerCluster,
    ManagedService(ServiceSpec),
}

/// One desired resource for the current run. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: LogicalName,
    pub depends_on: Vec<ResourceRef>,
    pub spec: DesiredSpec,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: LogicalName, spec: DesiredSpec) -> Self {
        Self {
            kind,
            name,
            depends_on: Vec::new(),
            spec,
        }
    }

    pub fn depends_on(mut self, dependency: ResourceRef) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind,
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_names_are_deterministic() {
        let first = LogicalName::derive("shared-notes", ResourceKind::DatabaseInstance).unwrap();
        let second = LogicalName::derive("shared-notes", ResourceKind::DatabaseInstance).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "shared-notes-db");

        let boundary =
            LogicalName::derive_qualified("shared-notes", ResourceKind::SecurityBoundary, "edge")
                .unwrap();
        assert_eq!(boundary.as_str(), "shared-notes-edge-boundary");
    }

    #[test]
    fn test_prefix_validation() {
        assert_eq!(validate_prefix(""), Err(NameError::EmptyPrefix));
        assert!(validate_prefix("Shared_Notes").is_err());
        assert!(validate_prefix("-notes").is_err());
        assert!(validate_prefix("notes-").is_err());
        assert!(validate_prefix("notes2").is_ok());

        let long = "a".repeat(60);
        assert!(matches!(
            LogicalName::derive(&long, ResourceKind::CacheSubnetGroup),
            Err(NameError::TooLong(_))
        ));
    }

    #[test]
    fn test_pending_record_never_exposes_available_endpoint() {
        let record = ResourceRecord {
            kind: ResourceKind::DatabaseInstance,
            name: LogicalName::from_existing("p-db"),
            id: ResourceId::new("db-1"),
            state: ResourceState::Creating,
            address: Some(HostPort {
                host: "db.internal".to_string(),
                port: 5432,
            }),
            attributes: BTreeMap::new(),
        };
        assert_eq!(record.endpoint().readiness, Readiness::Pending);

        let available = ResourceRecord {
            state: ResourceState::Available,
            address: None,
            ..record
        };
        assert_eq!(available.endpoint().readiness, Readiness::Pending);
    }

    #[test]
    fn test_spec_serializes_with_type_tag() {
        let spec = DesiredSpec::LogSink { retention_days: 7 };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "log-sink");
        assert_eq!(json["retention_days"], 7);
    }
}
