// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the stackup CLI

pub mod config;
pub mod provision;

pub use self::config::ConfigCommand;
pub use self::provision::ProvisionArgs;
