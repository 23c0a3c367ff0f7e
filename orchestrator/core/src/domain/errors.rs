// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fatal error taxonomy.
//!
//! Only these abort a phase. `AlreadyExists` is handled where it occurs and
//! a not-yet-ready endpoint is a report status, not an error.

use thiserror::Error;

use crate::domain::control_plane::ControlPlaneError;
use crate::domain::resource::NameError;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Credentials absent or rejected; raised before any resource call
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Required discovery returned nothing usable
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Control-plane failure on a step every later step depends on
    #[error("{resource}: {source}")]
    ControlPlane {
        resource: String,
        #[source]
        source: ControlPlaneError,
    },

    #[error("invalid resource name: {0}")]
    Naming(#[from] NameError),
}

impl ProvisioningError {
    pub fn control_plane(resource: impl Into<String>, source: ControlPlaneError) -> Self {
        match source {
            ControlPlaneError::Unauthenticated(reason) => Self::Authentication(reason),
            source => Self::ControlPlane {
                resource: resource.into(),
                source,
            },
        }
    }
}
