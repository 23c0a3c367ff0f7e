// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, port traits and configuration for idempotent provisioning.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by every provisioning component; no I/O

pub mod context;
pub mod control_plane;
pub mod endpoint;
pub mod errors;
pub mod network;
pub mod report;
pub mod resource;
pub mod secret;
pub mod security;
pub mod stack_config;
pub mod workload;
