// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Isolation boundaries and the directional allow-rules between them.

use serde::{Deserialize, Serialize};

use crate::domain::resource::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Edge,
    Compute,
    Database,
    Cache,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Edge, Tier::Compute, Tier::Database, Tier::Cache];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Compute => "compute",
            Self::Database => "database",
            Self::Cache => "cache",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleSource {
    Cidr(String),
    Boundary(ResourceId),
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cidr(cidr) => f.write_str(cidr),
            Self::Boundary(id) => write!(f, "boundary:{}", id),
        }
    }
}

/// Ingress allow-rule. Rules are set-like: equal rules are the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub protocol: String,
    pub port: u16,
    pub source: RuleSource,
}

impl SecurityRule {
    pub fn tcp(port: u16, source: RuleSource) -> Self {
        Self {
            protocol: "tcp".to_string(),
            port,
            source,
        }
    }
}

impl std::fmt::Display for SecurityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} from {}", self.protocol, self.port, self.source)
    }
}

/// Identifiers of the four per-tier boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBoundaries {
    pub edge: ResourceId,
    pub compute: ResourceId,
    pub database: ResourceId,
    pub cache: ResourceId,
}

impl SecurityBoundaries {
    pub fn get(&self, tier: Tier) -> &ResourceId {
        match tier {
            Tier::Edge => &self.edge,
            Tier::Compute => &self.compute,
            Tier::Database => &self.database,
            Tier::Cache => &self.cache,
        }
    }
}

/// Ports the directional rules open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPorts {
    pub workload: u16,
    pub database: u16,
    pub cache: u16,
}

pub const ANYWHERE: &str = "0.0.0.0/0";

/// `(target boundary, rule)` pairs: edge ingress 80/443 from anywhere,
/// edge→compute, compute→database, compute→cache.
pub fn directional_rules(
    boundaries: &SecurityBoundaries,
    ports: TierPorts,
) -> Vec<(Tier, SecurityRule)> {
    vec![
        (
            Tier::Edge,
            SecurityRule::tcp(80, RuleSource::Cidr(ANYWHERE.to_string())),
        ),
        (
            Tier::Edge,
            SecurityRule::tcp(443, RuleSource::Cidr(ANYWHERE.to_string())),
        ),
        (
            Tier::Compute,
            SecurityRule::tcp(ports.workload, RuleSource::Boundary(boundaries.edge.clone())),
        ),
        (
            Tier::Database,
            SecurityRule::tcp(ports.database, RuleSource::Boundary(boundaries.compute.clone())),
        ),
        (
            Tier::Cache,
            SecurityRule::tcp(ports.cache, RuleSource::Boundary(boundaries.compute.clone())),
        ),
    ]
}
