// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Control-Plane Ports
//!
//! Contracts for the two remote systems the orchestrator drives. Interfaces
//! are defined here in the domain layer and implemented in
//! `crate::infrastructure`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|----------------|
//! | `ControlPlane` | discover / create / describe cloud resources | `RestControlPlane`, `InMemoryControlPlane` |
//! | `SecretStore` | create / update / get named secrets | `RestSecretStore`, `InMemorySecretStore` |
//!
//! Every create verb reports a duplicate as `AlreadyExists`, distinct from all
//! other failures, so callers never have to inspect error text.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::context::AccountId;
use crate::domain::network::{Network, NetworkId, Subnet};
use crate::domain::resource::{DesiredSpec, LogicalName, ResourceId, ResourceKind, ResourceRecord};
use crate::domain::secret::{Credential, SecretVersion};
use crate::domain::security::SecurityRule;
use crate::domain::workload::{DefinitionRevision, RegisteredDefinition, WorkloadDefinition};

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Account the ambient credentials belong to
    async fn caller_identity(&self) -> Result<AccountId, ControlPlaneError>;

    /// Networks in the target region, in control-plane order
    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError>;

    /// Subnets of a network, in control-plane order
    async fn list_subnets(&self, network: &NetworkId) -> Result<Vec<Subnet>, ControlPlaneError>;

    /// Issue a create; returns as soon as the control plane accepted it
    async fn create(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
        spec: &DesiredSpec,
    ) -> Result<ResourceRecord, ControlPlaneError>;

    /// Look a resource up by logical name; `None` when absent
    async fn describe(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
    ) -> Result<Option<ResourceRecord>, ControlPlaneError>;

    /// Add one ingress rule to a boundary
    async fn add_rule(
        &self,
        boundary: &ResourceId,
        rule: &SecurityRule,
    ) -> Result<(), ControlPlaneError>;

    /// Register a new revision of a workload definition family
    async fn register_workload_definition(
        &self,
        definition: &WorkloadDefinition,
    ) -> Result<DefinitionRevision, ControlPlaneError>;

    /// Most recent revision of a family, if any was registered
    async fn latest_workload_definition(
        &self,
        family: &str,
    ) -> Result<Option<RegisteredDefinition>, ControlPlaneError>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn create(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError>;

    async fn update(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError>;

    /// Current value; only used to recall values this orchestrator stored itself
    async fn get(&self, name: &str) -> Result<Option<Credential>, SecretStoreError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("credentials rejected by control plane: {0}")]
    Unauthenticated(String),

    #[error("control plane rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("control plane unreachable: {0}")]
    Transport(String),

    #[error("unexpected control plane response: {0}")]
    Decode(String),
}

impl ControlPlaneError {
    pub fn already_exists(kind: impl std::fmt::Display, name: impl std::fmt::Display) -> Self {
        Self::AlreadyExists {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretStoreError {
    #[error("secret '{0}' already exists")]
    AlreadyExists(String),

    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("credentials rejected by secret store: {0}")]
    Unauthenticated(String),

    #[error("secret store rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("secret store unreachable: {0}")]
    Transport(String),
}
