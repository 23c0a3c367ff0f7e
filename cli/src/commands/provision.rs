// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning phase commands
//!
//! Wires configuration, credentials and the control-plane adapters into an
//! [`Orchestrator`] and prints the resulting report.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use stackup_core::application::Orchestrator;
use stackup_core::domain::context::{CallerCredentials, CredentialSource};
use stackup_core::domain::control_plane::{ControlPlane, SecretStore};
use stackup_core::domain::errors::ProvisioningError;
use stackup_core::domain::report::{Phase, ProvisioningReport};
use stackup_core::domain::secret::Credential;
use stackup_core::domain::stack_config::StackConfigManifest;
use stackup_core::infrastructure::credentials::{self, CredentialError};
use stackup_core::infrastructure::descriptor_template::DescriptorTemplateEngine;
use stackup_core::infrastructure::in_memory::{Sandbox, SANDBOX_ACCOUNT};
use stackup_core::infrastructure::{RestControlPlane, RestSecretStore};

use crate::output::{render_report, OutputFormat};

/// Global flags shared by both phases
#[derive(Debug, Clone)]
pub struct ProvisionArgs {
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub sandbox: Option<PathBuf>,
    pub output: OutputFormat,
}

/// Run one phase and return the process exit code
pub async fn run(phase: Phase, args: &ProvisionArgs) -> Result<i32> {
    let config = load_config(args)?;
    info!(
        phase = %phase,
        project = %config.spec.project,
        region = %config.spec.region,
        "Starting provisioning"
    );

    let report = match &args.sandbox {
        Some(path) => {
            let sandbox = Sandbox::open(path)?;
            let report = execute(
                phase,
                sandbox.control_plane.clone(),
                sandbox.secret_store.clone(),
                Some(sandbox_credentials(&config.spec.profile)),
                config,
            )
            .await;
            sandbox.save()?;
            info!(path = %sandbox.path().display(), "Sandbox saved");
            report
        }
        None => {
            let resolved = credentials::resolve(&config.spec.profile);
            execute_remote(phase, resolved, config).await?
        }
    };

    println!("{}", render_report(&report, args.output)?);
    Ok(report.exit_code())
}

async fn execute_remote(
    phase: Phase,
    resolved: Result<Option<CallerCredentials>, CredentialError>,
    config: StackConfigManifest,
) -> Result<ProvisioningReport> {
    let credentials = match resolved {
        Ok(credentials) => credentials,
        Err(err) => {
            error!(error = %err, "Could not load credentials");
            let fatal = ProvisioningError::Authentication(err.to_string());
            return Ok(ProvisioningReport::aborted(phase, &config.spec.project, &fatal));
        }
    };
    // Without credentials the identity step aborts before any request
    let token = credentials
        .as_ref()
        .map(|c| c.token.clone())
        .unwrap_or_else(|| Credential::new(String::new()));
    let endpoint = &config.spec.control_plane.endpoint;
    let timeout = Duration::from_secs(config.spec.control_plane.request_timeout_seconds);

    let control_plane = Arc::new(RestControlPlane::new(endpoint, token.clone(), timeout)?);
    let secret_store = Arc::new(RestSecretStore::new(endpoint, token, timeout)?);
    Ok(execute(phase, control_plane, secret_store, credentials, config).await)
}

fn load_config(args: &ProvisionArgs) -> Result<StackConfigManifest> {
    let mut config = StackConfigManifest::load_or_default(args.config.clone())
        .context("Failed to load configuration")?;
    if let Some(profile) = &args.profile {
        config.spec.profile = profile.clone();
    }
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

fn sandbox_credentials(profile: &str) -> CallerCredentials {
    CallerCredentials {
        profile: profile.to_string(),
        token: Credential::new(SANDBOX_ACCOUNT),
        source: CredentialSource::Sandbox,
    }
}

async fn execute(
    phase: Phase,
    control_plane: Arc<dyn ControlPlane>,
    secret_store: Arc<dyn SecretStore>,
    credentials: Option<CallerCredentials>,
    config: StackConfigManifest,
) -> ProvisioningReport {
    let orchestrator = Orchestrator::new(
        control_plane,
        secret_store,
        Arc::new(DescriptorTemplateEngine::new()),
        credentials,
        config,
    );
    match phase {
        Phase::NetworkTier => orchestrator.provision_network_tier().await,
        Phase::ServiceTier => orchestrator.provision_service_tier().await,
    }
}
