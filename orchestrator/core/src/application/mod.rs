// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod ledger;
pub mod create_or_get;

pub mod identity;
pub mod network_locator;
pub mod security_policy;
pub mod managed_resources;
pub mod secret_distributor;
pub mod observability;
pub mod edge;
pub mod workload;
pub mod orchestrator;

// Re-export components for convenience
pub use create_or_get::{create_or_get, describe_or_create, ProvisionFailure, Provisioned};
pub use edge::EdgeProvisioner;
pub use identity::IdentityResolver;
pub use managed_resources::{ManagedOutcome, ManagedResourceProvisioner};
pub use network_locator::NetworkLocator;
pub use observability::ObservabilityBootstrapper;
pub use orchestrator::Orchestrator;
pub use secret_distributor::SecretDistributor;
pub use security_policy::{RuleOutcome, SecurityPolicyBuilder};
pub use workload::WorkloadProvisioner;
