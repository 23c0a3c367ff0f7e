// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stackup Core
//!
//! Discover-or-create provisioning of a networked service topology against a
//! remote control plane.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, provisioning components and control-plane adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
