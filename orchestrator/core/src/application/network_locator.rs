// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Network Locator
//!
//! Discovers the pre-existing network instead of creating one.
//!
//! # Selection Policy
//!
//! - The network flagged as default wins; otherwise the first one returned.
//! - Subnets are taken in control-plane order and the first two are used for
//!   both the public and the private role.
//! - Zero networks or fewer than two subnets is a fatal precondition failure.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::control_plane::ControlPlane;
use crate::domain::errors::ProvisioningError;
use crate::domain::network::{Network, NetworkTopology, Subnet};

pub struct NetworkLocator {
    control_plane: Arc<dyn ControlPlane>,
}

impl NetworkLocator {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    pub async fn locate(&self) -> Result<NetworkTopology, ProvisioningError> {
        let networks = self
            .control_plane
            .list_networks()
            .await
            .map_err(|err| ProvisioningError::control_plane("network discovery", err))?;

        let network = Self::select_network(networks).ok_or_else(|| {
            ProvisioningError::Precondition("no usable network: the region has no networks".to_string())
        })?;

        let subnets = self
            .control_plane
            .list_subnets(&network.id)
            .await
            .map_err(|err| ProvisioningError::control_plane("subnet discovery", err))?;

        let found = subnets.len();
        let (primary, secondary) = Self::select_subnets(subnets).ok_or_else(|| {
            ProvisioningError::Precondition(format!(
                "no usable network: {} has {} subnet(s), at least 2 are required",
                network.id, found
            ))
        })?;

        if network.default_route_target.is_none() {
            warn!(network = %network.id, "Network has no default route target; edge traffic may not be routable");
        }

        info!(
            network = %network.id,
            primary = %primary.id,
            secondary = %secondary.id,
            "Located network"
        );

        Ok(NetworkTopology {
            network,
            primary,
            secondary,
        })
    }

    fn select_network(networks: Vec<Network>) -> Option<Network> {
        let default = networks.iter().position(|n| n.is_default);
        let mut networks = networks;
        match default {
            Some(index) => Some(networks.swap_remove(index)),
            None => networks.into_iter().next(),
        }
    }

    /// First two subnets in the order given
    pub fn select_subnets(subnets: Vec<Subnet>) -> Option<(Subnet, Subnet)> {
        let mut iter = subnets.into_iter();
        match (iter.next(), iter.next()) {
            (Some(first), Some(second)) => Some((first, second)),
            _ => None,
        }
    }
}
