// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::network::NetworkTopology;
use crate::domain::resource::{LogicalName, NameError, ResourceKind};
use crate::domain::secret::SecretNames;
use crate::domain::security::{SecurityBoundaries, Tier};

/// Opaque account identifier returned by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything discovered before resources can be created.
///
/// Built once per phase after identity, network and boundaries are known and
/// passed by reference to every later component. Has no mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningContext {
    project: String,
    region: String,
    account: AccountId,
    network: NetworkTopology,
    boundaries: SecurityBoundaries,
    secret_names: SecretNames,
}

impl ProvisioningContext {
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        account: AccountId,
        network: NetworkTopology,
        boundaries: SecurityBoundaries,
    ) -> Self {
        let project = project.into();
        let secret_names = SecretNames::for_project(&project);
        Self {
            project,
            region: region.into(),
            account,
            network,
            boundaries,
            secret_names,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn network(&self) -> &NetworkTopology {
        &self.network
    }

    pub fn boundaries(&self) -> &SecurityBoundaries {
        &self.boundaries
    }

    pub fn secret_names(&self) -> &SecretNames {
        &self.secret_names
    }

    pub fn name_for(&self, kind: ResourceKind) -> Result<LogicalName, NameError> {
        LogicalName::derive(&self.project, kind)
    }

    pub fn boundary_name(&self, tier: Tier) -> Result<LogicalName, NameError> {
        LogicalName::derive_qualified(&self.project, ResourceKind::SecurityBoundary, tier.as_str())
    }
}

/// Where the caller's API token came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Environment,
    ProfileFile,
    Sandbox,
}

/// Ambient credentials resolved before the run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerCredentials {
    pub profile: String,
    pub token: crate::domain::secret::Credential,
    pub source: CredentialSource,
}
