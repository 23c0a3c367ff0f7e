// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubnetId(pub String);

impl std::fmt::Display for SubnetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// Gateway that the network's default route points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_route_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: SubnetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
}

/// Discovered network with the two subnets selected for this stack.
///
/// Public and private roles are deliberately collapsed onto the same pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub network: Network,
    pub primary: Subnet,
    pub secondary: Subnet,
}

impl NetworkTopology {
    pub fn network_id(&self) -> &NetworkId {
        &self.network.id
    }

    pub fn public_subnets(&self) -> Vec<SubnetId> {
        vec![self.primary.id.clone(), self.secondary.id.clone()]
    }

    pub fn private_subnets(&self) -> Vec<SubnetId> {
        self.public_subnets()
    }

    pub fn default_route_target(&self) -> Option<&str> {
        self.network.default_route_target.as_deref()
    }
}
