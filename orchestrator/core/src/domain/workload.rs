// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::stack_config::WorkloadTemplate;

/// Target-group health check parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_interval")]
    pub interval_seconds: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval_seconds: default_interval(),
            timeout_seconds: default_timeout(),
            healthy_threshold: default_healthy_threshold(),
            unhealthy_threshold: default_unhealthy_threshold(),
        }
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_interval() -> u32 {
    30
}

fn default_timeout() -> u32 {
    5
}

fn default_healthy_threshold() -> u32 {
    2
}

fn default_unhealthy_threshold() -> u32 {
    3
}

/// Environment variable filled from a published secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBinding {
    pub env_name: String,
    pub secret_name: String,
}

/// Rendered workload descriptor, ready for registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDefinition {
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu_units: u32,
    pub memory_mb: u32,
    pub port: u16,
    pub environment: BTreeMap<String, String>,
    pub secrets: Vec<SecretBinding>,
    pub log_sink: String,
    pub region: String,
}

/// Versioned definition identifier (`family:revision`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRevision {
    pub family: String,
    pub revision: u32,
}

impl DefinitionRevision {
    pub fn id(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

impl std::fmt::Display for DefinitionRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.family, self.revision)
    }
}

/// Latest registered revision together with its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDefinition {
    pub revision: DefinitionRevision,
    pub definition: WorkloadDefinition,
}

/// Values a workload template may reference
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorContext {
    pub account_id: String,
    pub region: String,
    pub project: String,
}

impl DescriptorContext {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            project: project.into(),
        }
    }

    /// Stand-in values used to check a template before any run
    pub fn placeholder() -> Self {
        Self::new("000000000000", "region-1", "project")
    }
}

/// Turns the configured workload template into a concrete definition
pub trait DescriptorRenderer: Send + Sync {
    fn render_workload(
        &self,
        template: &WorkloadTemplate,
        context: &DescriptorContext,
        family: &str,
        log_sink: &str,
        secrets: Vec<SecretBinding>,
    ) -> anyhow::Result<WorkloadDefinition>;
}
