// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Stack Configuration Types
//
// Defines the static configuration a provisioning run is derived from:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Project prefix (idempotency key root), region, credential profile
// - Control-plane endpoint
// - Managed database / cache sizing
// - Edge health check and listener settings
// - Workload descriptor template ({{account_id}}, {{region}}, {{project}})

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::resource::validate_prefix;
use crate::domain::workload::HealthCheck;

pub const API_VERSION: &str = "stackup.dev/v1";
pub const KIND: &str = "StackConfig";

/// Top-level Kubernetes-style stack configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfigManifest {
    /// API version (must be "stackup.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "StackConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: StackSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    /// Prefix every logical resource name is derived from
    pub project: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Credential profile name in ~/.stackup/credentials.yaml
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub edge: EdgeConfig,

    #[serde(default)]
    pub workload: WorkloadTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    /// Base URL of the management API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_db_engine")]
    pub engine: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,

    #[serde(default = "default_db_instance_class")]
    pub instance_class: String,

    #[serde(default = "default_db_storage")]
    pub storage_gb: u32,

    #[serde(default)]
    pub multi_zone: bool,

    #[serde(default = "default_true")]
    pub encrypted: bool,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_name")]
    pub database_name: String,

    #[serde(default = "default_db_username")]
    pub master_username: String,

    #[serde(default = "default_backup_retention")]
    pub backup_retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: default_db_engine(),
            engine_version: None,
            instance_class: default_db_instance_class(),
            storage_gb: default_db_storage(),
            multi_zone: false,
            encrypted: true,
            port: default_db_port(),
            database_name: default_db_name(),
            master_username: default_db_username(),
            backup_retention_days: default_backup_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_cache_engine")]
    pub engine: String,

    #[serde(default = "default_cache_node_type")]
    pub node_type: String,

    #[serde(default = "default_cache_nodes")]
    pub node_count: u32,

    #[serde(default = "default_cache_port")]
    pub port: u16,

    /// Logical database index embedded in the connection string
    #[serde(default)]
    pub database_index: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            engine: default_cache_engine(),
            node_type: default_cache_node_type(),
            node_count: default_cache_nodes(),
            port: default_cache_port(),
            database_index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log sink name; defaults to `{project}-logs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_sink: Option<String>,

    #[serde(default = "default_log_retention")]
    pub retention_days: u32,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_sink: None,
            retention_days: default_log_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConfig {
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,

    #[serde(default)]
    pub health_check: HealthCheck,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listener_port: default_listener_port(),
            health_check: HealthCheck::default(),
        }
    }
}

/// Workload descriptor template; string values may use `{{account_id}}`,
/// `{{region}}` and `{{project}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTemplate {
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_container_name")]
    pub container_name: String,

    #[serde(default = "default_cpu")]
    pub cpu_units: u32,

    #[serde(default = "default_memory")]
    pub memory_mb: u32,

    #[serde(default = "default_workload_port")]
    pub port: u16,

    #[serde(default = "default_desired_count")]
    pub desired_count: u32,

    #[serde(default = "default_grace_period")]
    pub health_check_grace_seconds: u32,

    #[serde(default = "default_true")]
    pub assign_public_ip: bool,

    #[serde(default = "default_environment")]
    pub environment: BTreeMap<String, String>,
}

impl Default for WorkloadTemplate {
    fn default() -> Self {
        Self {
            image: default_image(),
            container_name: default_container_name(),
            cpu_units: default_cpu(),
            memory_mb: default_memory(),
            port: default_workload_port(),
            desired_count: default_desired_count(),
            health_check_grace_seconds: default_grace_period(),
            assign_public_ip: true,
            environment: default_environment(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_db_engine() -> String {
    "postgres".to_string()
}

fn default_db_instance_class() -> String {
    "db.t3.micro".to_string()
}

fn default_db_storage() -> u32 {
    20
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "shared_notes".to_string()
}

fn default_db_username() -> String {
    "notes_admin".to_string()
}

fn default_backup_retention() -> u32 {
    7
}

fn default_cache_engine() -> String {
    "redis".to_string()
}

fn default_cache_node_type() -> String {
    "cache.t3.micro".to_string()
}

fn default_cache_nodes() -> u32 {
    1
}

fn default_cache_port() -> u16 {
    6379
}

fn default_log_retention() -> u32 {
    7
}

fn default_listener_port() -> u16 {
    80
}

fn default_image() -> String {
    "{{account_id}}.registry.{{region}}.internal/{{project}}:latest".to_string()
}

fn default_container_name() -> String {
    "api".to_string()
}

fn default_cpu() -> u32 {
    256
}

fn default_memory() -> u32 {
    512
}

fn default_workload_port() -> u16 {
    8000
}

fn default_desired_count() -> u32 {
    1
}

fn default_grace_period() -> u32 {
    60
}

fn default_environment() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("APP_REGION".to_string(), "{{region}}".to_string()),
        ("DEBUG".to_string(), "false".to_string()),
        ("ALGORITHM".to_string(), "HS256".to_string()),
        ("ACCESS_TOKEN_EXPIRE_MINUTES".to_string(), "30".to_string()),
        ("REFRESH_TOKEN_EXPIRE_DAYS".to_string(), "7".to_string()),
    ])
}

impl Default for StackSpec {
    fn default() -> Self {
        Self {
            project: "shared-notes".to_string(),
            region: default_region(),
            profile: default_profile(),
            control_plane: ControlPlaneConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            edge: EdgeConfig::default(),
            workload: WorkloadTemplate::default(),
        }
    }
}

impl Default for StackConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "shared-notes".to_string(),
                labels: None,
            },
            spec: StackSpec::default(),
        }
    }
}

impl StackConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. STACKUP_CONFIG_PATH environment variable
    /// 2. ./stackup.yaml (working directory)
    /// 3. ~/.stackup/config.yaml (user home)
    /// 4. /etc/stackup/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STACKUP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./stackup.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stackup").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/stackup/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("STACKUP_PROJECT", &mut self.spec.project),
            ("STACKUP_REGION", &mut self.spec.region),
            ("STACKUP_PROFILE", &mut self.spec.profile),
            ("STACKUP_ENDPOINT", &mut self.spec.control_plane.endpoint),
        ];
        for (var, target) in overrides {
            if let Ok(val) = std::env::var(var) {
                if val.is_empty() {
                    tracing::warn!("Ignoring empty environment override {}", var);
                    continue;
                }
                tracing::info!("Environment override: {}={}", var, val);
                *target = val;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        validate_prefix(&self.spec.project)
            .map_err(|e| anyhow::anyhow!("spec.project: {}", e))?;

        if self.spec.region.is_empty() {
            anyhow::bail!("spec.region cannot be empty");
        }

        if self.spec.control_plane.endpoint.is_empty() {
            anyhow::bail!("spec.controlPlane.endpoint cannot be empty");
        }

        if self.spec.database.port == 0 {
            anyhow::bail!("spec.database.port must be non-zero");
        }

        if self.spec.database.master_username.is_empty() {
            anyhow::bail!("spec.database.masterUsername cannot be empty");
        }

        if self.spec.cache.port == 0 {
            anyhow::bail!("spec.cache.port must be non-zero");
        }

        if self.spec.cache.node_count == 0 {
            anyhow::bail!("spec.cache.nodeCount must be at least 1");
        }

        let health = &self.spec.edge.health_check;
        if health.healthy_threshold == 0 || health.unhealthy_threshold == 0 {
            anyhow::bail!("spec.edge.healthCheck thresholds must be at least 1");
        }
        if health.timeout_seconds >= health.interval_seconds {
            anyhow::bail!(
                "spec.edge.healthCheck timeout ({}s) must be shorter than interval ({}s)",
                health.timeout_seconds,
                health.interval_seconds
            );
        }
        if !health.path.starts_with('/') {
            anyhow::bail!("spec.edge.healthCheck.path must start with '/'");
        }

        let workload = &self.spec.workload;
        if workload.port == 0 {
            anyhow::bail!("spec.workload.port must be non-zero");
        }
        if workload.desired_count == 0 {
            anyhow::bail!("spec.workload.desiredCount must be at least 1");
        }
        if workload.image.is_empty() {
            anyhow::bail!("spec.workload.image cannot be empty");
        }

        Ok(())
    }

    pub fn log_sink_name(&self) -> String {
        self.spec
            .observability
            .log_sink
            .clone()
            .unwrap_or_else(|| format!("{}-logs", self.spec.project))
    }
}
