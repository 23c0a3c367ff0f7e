// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ambient credential resolution.
//!
//! Precedence:
//! 1. `STACKUP_API_TOKEN` environment variable
//! 2. the named profile in `~/.stackup/credentials.yaml`
//!
//! ```yaml
//! profiles:
//!   default:
//!     token: sk-...
//! ```
//!
//! Finding nothing is not an error here; the identity step reports it.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::domain::context::{CallerCredentials, CredentialSource};
use crate::domain::secret::Credential;

pub const TOKEN_ENV: &str = "STACKUP_API_TOKEN";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credentials file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("profile '{0}' has an empty token")]
    EmptyToken(String),
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    profiles: HashMap<String, ProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    token: Credential,
}

/// `~/.stackup/credentials.yaml`
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stackup").join("credentials.yaml"))
}

/// Resolve credentials for `profile` from the environment, then the default file
pub fn resolve(profile: &str) -> Result<Option<CallerCredentials>, CredentialError> {
    let env_token = std::env::var(TOKEN_ENV).ok();
    resolve_from(profile, env_token, default_credentials_path().as_deref())
}

pub fn resolve_from(
    profile: &str,
    env_token: Option<String>,
    credentials_file: Option<&Path>,
) -> Result<Option<CallerCredentials>, CredentialError> {
    if let Some(token) = env_token.filter(|token| !token.is_empty()) {
        debug!(profile = %profile, "Using token from {}", TOKEN_ENV);
        return Ok(Some(CallerCredentials {
            profile: profile.to_string(),
            token: Credential::new(token),
            source: CredentialSource::Environment,
        }));
    }

    let Some(path) = credentials_file.filter(|path| path.exists()) else {
        return Ok(None);
    };

    let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: CredentialsFile = if content.trim().is_empty() {
        CredentialsFile::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    match file.profiles.get(profile) {
        Some(entry) if entry.token.expose().is_empty() => {
            Err(CredentialError::EmptyToken(profile.to_string()))
        }
        Some(entry) => {
            debug!(profile = %profile, path = ?path, "Using token from credentials file");
            Ok(Some(CallerCredentials {
                profile: profile.to_string(),
                token: entry.token.clone(),
                source: CredentialSource::ProfileFile,
            }))
        }
        None => Ok(None),
    }
}
