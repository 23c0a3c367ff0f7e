// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::context::{AccountId, CallerCredentials};
use crate::domain::control_plane::{ControlPlane, ControlPlaneError};
use crate::domain::errors::ProvisioningError;

/// Resolves the account the ambient credentials belong to.
///
/// Failure here is fatal and happens before any resource call.
pub struct IdentityResolver {
    control_plane: Arc<dyn ControlPlane>,
    credentials: Option<CallerCredentials>,
    profile: String,
}

impl IdentityResolver {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        credentials: Option<CallerCredentials>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            control_plane,
            credentials,
            profile: profile.into(),
        }
    }

    pub async fn resolve(&self) -> Result<AccountId, ProvisioningError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ProvisioningError::Authentication(format!(
                "no credentials found for profile '{}' (set STACKUP_API_TOKEN or add the profile to ~/.stackup/credentials.yaml)",
                self.profile
            ))
        })?;
        debug!(profile = %credentials.profile, source = ?credentials.source, "Resolving caller identity");

        let account = self
            .control_plane
            .caller_identity()
            .await
            .map_err(|err| match err {
                ControlPlaneError::Unauthenticated(reason) => {
                    ProvisioningError::Authentication(reason)
                }
                other => ProvisioningError::control_plane("caller identity", other),
            })?;

        info!(account = %account, "Resolved caller identity");
        Ok(account)
    }
}
