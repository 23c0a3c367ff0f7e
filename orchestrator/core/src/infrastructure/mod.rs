// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod credentials;
pub mod descriptor_template;
pub mod in_memory;
pub mod rest_control_plane;

pub use in_memory::{InMemoryControlPlane, InMemorySecretStore};
pub use rest_control_plane::{RestControlPlane, RestSecretStore};
