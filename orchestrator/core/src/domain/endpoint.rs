// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::resource::HostPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Pending,
    Available,
}

/// Network address of a managed resource, as far as the control plane knows it.
///
/// A host may already be assigned while the resource is still pending; it must
/// not be handed to consumers until `readiness` is `Available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: Option<HostPort>,
    pub readiness: Readiness,
}

impl Endpoint {
    pub fn pending(address: Option<HostPort>) -> Self {
        Self {
            address,
            readiness: Readiness::Pending,
        }
    }

    pub fn available(address: HostPort) -> Self {
        Self {
            address: Some(address),
            readiness: Readiness::Available,
        }
    }

    /// The address, only once it is safe to publish
    pub fn resolvable(&self) -> Option<&HostPort> {
        match self.readiness {
            Readiness::Available => self.address.as_ref(),
            Readiness::Pending => None,
        }
    }
}
