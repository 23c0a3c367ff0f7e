// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST Control Plane Adapter
//!
//! Anti-corruption layer between the [`ControlPlane`] / [`SecretStore`] ports
//! and the control plane's HTTP API. Every request carries the caller's
//! bearer token.
//!
//! | Verb | Endpoint |
//! |------|----------|
//! | caller identity | `GET /v1/identity` |
//! | list networks | `GET /v1/networks` |
//! | list subnets | `GET /v1/networks/{id}/subnets` |
//! | create | `POST /v1/resources/{kind}` |
//! | describe | `GET /v1/resources/{kind}/{name}` |
//! | add rule | `POST /v1/resources/security-boundary/{id}/rules` |
//! | register definition | `POST /v1/workload-definitions/{family}` |
//! | latest definition | `GET /v1/workload-definitions/{family}/latest` |
//! | secrets | `POST /v1/secrets`, `PUT /v1/secrets/{name}`, `GET /v1/secrets/{name}` |
//!
//! Status mapping: 409 → `AlreadyExists`, 404 → absent / `NotFound`,
//! 401 → `Unauthenticated`, anything else unsuccessful → `Rejected`.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::domain::context::AccountId;
use crate::domain::control_plane::{ControlPlane, ControlPlaneError, SecretStore, SecretStoreError};
use crate::domain::network::{Network, NetworkId, Subnet};
use crate::domain::resource::{DesiredSpec, LogicalName, ResourceId, ResourceKind, ResourceRecord};
use crate::domain::secret::{Credential, SecretVersion};
use crate::domain::security::SecurityRule;
use crate::domain::workload::{DefinitionRevision, RegisteredDefinition, WorkloadDefinition};

#[derive(Deserialize)]
struct IdentityResponse {
    account_id: String,
}

#[derive(Deserialize)]
struct NetworksResponse {
    networks: Vec<Network>,
}

#[derive(Deserialize)]
struct SubnetsResponse {
    subnets: Vec<Subnet>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a LogicalName,
    spec: &'a DesiredSpec,
}

#[derive(Serialize)]
struct SecretCreateRequest<'a> {
    name: &'a str,
    value: &'a Credential,
}

#[derive(Serialize)]
struct SecretUpdateRequest<'a> {
    value: &'a Credential,
}

#[derive(Deserialize)]
struct SecretVersionResponse {
    version: SecretVersion,
}

#[derive(Deserialize)]
struct SecretValueResponse {
    value: Credential,
}

/// Authenticated HTTP client shared by both adapters
#[derive(Clone)]
struct RestClient {
    client: reqwest::Client,
    base: Url,
    token: Credential,
}

impl RestClient {
    fn new(endpoint: &str, token: Credential, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(endpoint)
            .with_context(|| format!("Invalid control plane endpoint: {}", endpoint))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Control plane endpoint must be an http(s) URL: {}", endpoint);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base, token })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(method = %method, url = %url, "Control plane request");
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose())
    }
}

async fn error_text(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

async fn control_plane_error(response: Response, kind: &str, name: &str) -> ControlPlaneError {
    let status = response.status();
    match status {
        StatusCode::CONFLICT => ControlPlaneError::already_exists(kind, name),
        StatusCode::NOT_FOUND => ControlPlaneError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        StatusCode::UNAUTHORIZED => ControlPlaneError::Unauthenticated(error_text(response).await),
        _ => ControlPlaneError::Rejected {
            status: status.as_u16(),
            reason: error_text(response).await,
        },
    }
}

fn transport(err: reqwest::Error) -> ControlPlaneError {
    ControlPlaneError::Transport(err.to_string())
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ControlPlaneError> {
    response
        .json()
        .await
        .map_err(|e| ControlPlaneError::Decode(e.to_string()))
}

pub struct RestControlPlane {
    http: RestClient,
}

impl RestControlPlane {
    pub fn new(endpoint: &str, token: Credential, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: RestClient::new(endpoint, token, timeout)?,
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        segments: &[&str],
        kind: &str,
        name: &str,
    ) -> Result<Option<T>, ControlPlaneError> {
        let response = self
            .http
            .request(Method::GET, segments)
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(control_plane_error(response, kind, name).await);
        }
        decode(response).await.map(Some)
    }

    async fn get_required<T: for<'de> Deserialize<'de>>(
        &self,
        segments: &[&str],
        what: &str,
    ) -> Result<T, ControlPlaneError> {
        self.get(segments, what, "").await?.ok_or_else(|| ControlPlaneError::NotFound {
            kind: what.to_string(),
            name: String::new(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
        kind: &str,
        name: &str,
    ) -> Result<Response, ControlPlaneError> {
        let response = self
            .http
            .request(Method::POST, segments)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(control_plane_error(response, kind, name).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ControlPlane for RestControlPlane {
    async fn caller_identity(&self) -> Result<AccountId, ControlPlaneError> {
        let identity: IdentityResponse = self.get_required(&["v1", "identity"], "identity").await?;
        Ok(AccountId(identity.account_id))
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError> {
        let response: NetworksResponse = self.get_required(&["v1", "networks"], "networks").await?;
        Ok(response.networks)
    }

    async fn list_subnets(&self, network: &NetworkId) -> Result<Vec<Subnet>, ControlPlaneError> {
        let response: SubnetsResponse = self
            .get_required(&["v1", "networks", &network.0, "subnets"], "subnets")
            .await?;
        Ok(response.subnets)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
        spec: &DesiredSpec,
    ) -> Result<ResourceRecord, ControlPlaneError> {
        let response = self
            .post(
                &["v1", "resources", kind.as_str()],
                &CreateRequest { name, spec },
                kind.as_str(),
                name.as_str(),
            )
            .await?;
        decode(response).await
    }

    async fn describe(
        &self,
        kind: ResourceKind,
        name: &LogicalName,
    ) -> Result<Option<ResourceRecord>, ControlPlaneError> {
        self.get(
            &["v1", "resources", kind.as_str(), name.as_str()],
            kind.as_str(),
            name.as_str(),
        )
        .await
    }

    async fn add_rule(&self, boundary: &ResourceId, rule: &SecurityRule) -> Result<(), ControlPlaneError> {
        let label = rule.to_string();
        self.post(
            &[
                "v1",
                "resources",
                ResourceKind::SecurityBoundary.as_str(),
                boundary.as_str(),
                "rules",
            ],
            rule,
            "security-rule",
            &label,
        )
        .await?;
        Ok(())
    }

    async fn register_workload_definition(
        &self,
        definition: &WorkloadDefinition,
    ) -> Result<DefinitionRevision, ControlPlaneError> {
        let response = self
            .post(
                &["v1", "workload-definitions", &definition.family],
                definition,
                ResourceKind::WorkloadDefinition.as_str(),
                &definition.family,
            )
            .await?;
        decode(response).await
    }

    async fn latest_workload_definition(
        &self,
        family: &str,
    ) -> Result<Option<RegisteredDefinition>, ControlPlaneError> {
        self.get(
            &["v1", "workload-definitions", family, "latest"],
            ResourceKind::WorkloadDefinition.as_str(),
            family,
        )
        .await
    }
}

pub struct RestSecretStore {
    http: RestClient,
}

impl RestSecretStore {
    pub fn new(endpoint: &str, token: Credential, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: RestClient::new(endpoint, token, timeout)?,
        })
    }

    async fn send(&self, request: RequestBuilder, name: &str) -> Result<Response, SecretStoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| SecretStoreError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(match status {
            StatusCode::CONFLICT => SecretStoreError::AlreadyExists(name.to_string()),
            StatusCode::NOT_FOUND => SecretStoreError::NotFound(name.to_string()),
            StatusCode::UNAUTHORIZED => SecretStoreError::Unauthenticated(error_text(response).await),
            _ => SecretStoreError::Rejected {
                status: status.as_u16(),
                reason: error_text(response).await,
            },
        })
    }

    async fn version(response: Response) -> Result<SecretVersion, SecretStoreError> {
        response
            .json::<SecretVersionResponse>()
            .await
            .map(|body| body.version)
            .map_err(|e| SecretStoreError::Transport(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl SecretStore for RestSecretStore {
    async fn create(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError> {
        let request = self
            .http
            .request(Method::POST, &["v1", "secrets"])
            .json(&SecretCreateRequest { name, value });
        let response = self.send(request, name).await?;
        Self::version(response).await
    }

    async fn update(&self, name: &str, value: &Credential) -> Result<SecretVersion, SecretStoreError> {
        let request = self
            .http
            .request(Method::PUT, &["v1", "secrets", name])
            .json(&SecretUpdateRequest { value });
        let response = self.send(request, name).await?;
        Self::version(response).await
    }

    async fn get(&self, name: &str) -> Result<Option<Credential>, SecretStoreError> {
        let request = self.http.request(Method::GET, &["v1", "secrets", name]);
        match self.send(request, name).await {
            Ok(response) => response
                .json::<SecretValueResponse>()
                .await
                .map(|body| Some(body.value))
                .map_err(|e| SecretStoreError::Transport(format!("Failed to parse response: {}", e))),
            Err(SecretStoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
