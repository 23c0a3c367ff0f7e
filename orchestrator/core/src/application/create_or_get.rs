// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Create-or-get primitives shared by every provisioning component.
//!
//! Two orderings of the same idempotent step:
//!
//! - [`create_or_get`]: attempt the create, fall back to a describe on
//!   `AlreadyExists` (cheap resources: boundaries, edge, clusters, sinks)
//! - [`describe_or_create`]: describe first, create only when absent
//!   (managed stateful resources, where a create carries generated secrets)
//!
//! Both refuse to touch a resource whose dependencies are not available in
//! the current run, and record the outcome in the [`RunLedger`].

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::ledger::RunLedger;
use crate::domain::control_plane::{ControlPlane, ControlPlaneError};
use crate::domain::report::Step;
use crate::domain::resource::{NameError, ResourceDescriptor, ResourceRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum Provisioned {
    Created(ResourceRecord),
    Reused(ResourceRecord),
}

impl Provisioned {
    pub fn record(&self) -> &ResourceRecord {
        match self {
            Self::Created(record) | Self::Reused(record) => record,
        }
    }

    pub fn into_record(self) -> ResourceRecord {
        match self {
            Self::Created(record) | Self::Reused(record) => record,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Error)]
pub enum ProvisionFailure {
    #[error("waiting on {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("{0} reported as existing but describe returned nothing")]
    Vanished(String),

    #[error("invalid desired state: {0}")]
    InvalidSpec(String),

    #[error("invalid resource name: {0}")]
    Naming(#[from] NameError),
}

impl ProvisionFailure {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::ControlPlane(ControlPlaneError::Unauthenticated(_)))
    }
}

fn check_dependencies(
    ledger: &mut RunLedger,
    step: Step,
    descriptor: &ResourceDescriptor,
) -> Result<(), ProvisionFailure> {
    let unmet: Vec<String> = ledger
        .unmet_dependencies(descriptor)
        .into_iter()
        .map(|dep| dep.to_string())
        .collect();
    if unmet.is_empty() {
        return Ok(());
    }
    let reason = unmet.join(", ");
    warn!(
        kind = %descriptor.kind,
        name = %descriptor.name,
        "Skipping: dependencies not available ({})",
        reason
    );
    ledger.record_skipped(step, &descriptor.reference(), format!("waiting on {}", reason));
    Err(ProvisionFailure::DependencyUnavailable(reason))
}

fn fail(
    ledger: &mut RunLedger,
    step: Step,
    descriptor: &ResourceDescriptor,
    failure: ProvisionFailure,
) -> ProvisionFailure {
    warn!(kind = %descriptor.kind, name = %descriptor.name, "Provisioning failed: {}", failure);
    ledger.record_failure(step, &descriptor.reference(), failure.to_string());
    failure
}

/// Attempt create; on `AlreadyExists` look the resource up by name.
pub async fn create_or_get(
    control_plane: &dyn ControlPlane,
    ledger: &mut RunLedger,
    step: Step,
    descriptor: &ResourceDescriptor,
) -> Result<Provisioned, ProvisionFailure> {
    check_dependencies(ledger, step, descriptor)?;

    debug!(kind = %descriptor.kind, name = %descriptor.name, "Creating resource");
    let provisioned = match control_plane
        .create(descriptor.kind, &descriptor.name, &descriptor.spec)
        .await
    {
        Ok(record) => {
            info!(kind = %descriptor.kind, name = %descriptor.name, id = %record.id, "Created");
            Provisioned::Created(record)
        }
        Err(err) if err.is_already_exists() => {
            debug!(kind = %descriptor.kind, name = %descriptor.name, "Already exists, looking up");
            match control_plane.describe(descriptor.kind, &descriptor.name).await {
                Ok(Some(record)) => {
                    info!(kind = %descriptor.kind, name = %descriptor.name, id = %record.id, "Reused");
                    Provisioned::Reused(record)
                }
                Ok(None) => {
                    let failure = ProvisionFailure::Vanished(descriptor.reference().to_string());
                    return Err(fail(ledger, step, descriptor, failure));
                }
                Err(err) => return Err(fail(ledger, step, descriptor, err.into())),
            }
        }
        Err(err) => return Err(fail(ledger, step, descriptor, err.into())),
    };

    ledger.record_resource(step, provisioned.record(), provisioned.was_created());
    Ok(provisioned)
}

/// Describe by logical name; create only when absent.
///
/// `spec_for_create` is only invoked on the create path, so generated values
/// (credentials) are produced exactly when they will be used.
pub async fn describe_or_create<F>(
    control_plane: &dyn ControlPlane,
    ledger: &mut RunLedger,
    step: Step,
    descriptor: &ResourceDescriptor,
    spec_for_create: F,
) -> Result<Provisioned, ProvisionFailure>
where
    F: FnOnce() -> crate::domain::resource::DesiredSpec + Send,
{
    check_dependencies(ledger, step, descriptor)?;

    match control_plane.describe(descriptor.kind, &descriptor.name).await {
        Ok(Some(record)) => {
            info!(
                kind = %descriptor.kind,
                name = %descriptor.name,
                state = %record.state,
                "Found existing resource"
            );
            ledger.record_resource(step, &record, false);
            return Ok(Provisioned::Reused(record));
        }
        Ok(None) => {}
        Err(err) => return Err(fail(ledger, step, descriptor, err.into())),
    }

    let spec = spec_for_create();
    match control_plane
        .create(descriptor.kind, &descriptor.name, &spec)
        .await
    {
        Ok(record) => {
            info!(
                kind = %descriptor.kind,
                name = %descriptor.name,
                id = %record.id,
                "Create requested; completion is asynchronous"
            );
            ledger.record_resource(step, &record, true);
            Ok(Provisioned::Created(record))
        }
        // Lost a race with a concurrent invocation; the other create wins.
        Err(err) if err.is_already_exists() => {
            match control_plane.describe(descriptor.kind, &descriptor.name).await {
                Ok(Some(record)) => {
                    ledger.record_resource(step, &record, false);
                    Ok(Provisioned::Reused(record))
                }
                Ok(None) => {
                    let failure = ProvisionFailure::Vanished(descriptor.reference().to_string());
                    Err(fail(ledger, step, descriptor, failure))
                }
                Err(err) => Err(fail(ledger, step, descriptor, err.into())),
            }
        }
        Err(err) => Err(fail(ledger, step, descriptor, err.into())),
    }
}
