// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secrets, credentials and connection-string composition.

use serde::{Deserialize, Serialize};

use crate::domain::resource::HostPort;

/// Sensitive string. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***, {} chars)", self.0.len())
    }
}

/// Version identifier returned by the secret store on every write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretVersion(pub String);

impl std::fmt::Display for SecretVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub value: Credential,
    pub version: SecretVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretWrite {
    Created(SecretVersion),
    Updated(SecretVersion),
}

impl SecretWrite {
    pub fn version(&self) -> &SecretVersion {
        match self {
            Self::Created(version) | Self::Updated(version) => version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishResult {
    Published(SecretWrite),
    /// Referenced endpoint not yet available; nothing was written.
    Deferred,
}

/// How a connection string is composed from an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    Postgres {
        username: String,
        password: Credential,
        database: String,
    },
    Redis {
        database_index: u8,
    },
}

impl ConnectionSpec {
    pub fn compose(&self, address: &HostPort) -> Credential {
        match self {
            Self::Postgres {
                username,
                password,
                database,
            } => Credential::new(format!(
                "postgresql://{}:{}@{}:{}/{}",
                username,
                password.expose(),
                address.host,
                address.port,
                database
            )),
            Self::Redis { database_index } => Credential::new(format!(
                "redis://{}:{}/{}",
                address.host, address.port, database_index
            )),
        }
    }
}

/// Secret names published for a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretNames {
    pub database_url: String,
    pub cache_url: String,
    pub signing_key: String,
    pub database_master_credential: String,
}

impl SecretNames {
    pub fn for_project(prefix: &str) -> Self {
        Self {
            database_url: format!("{}/database-url", prefix),
            cache_url: format!("{}/redis-url", prefix),
            signing_key: format!("{}/secret-key", prefix),
            database_master_credential: format!("{}/database-master-credential", prefix),
        }
    }
}
