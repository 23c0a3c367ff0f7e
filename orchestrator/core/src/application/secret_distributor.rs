// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secret Distributor
//!
//! Publishes connection strings and the signing key to the secret store.
//!
//! - A connection string is written only once its endpoint is `Available`;
//!   otherwise the write is deferred to a later run and nothing is sent.
//! - Every write is an upsert: create, and on `AlreadyExists` update.
//! - The database master credential is kept in the store so later runs can
//!   compose the connection string without regenerating it.

use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::ledger::RunLedger;
use crate::domain::control_plane::{SecretStore, SecretStoreError};
use crate::domain::endpoint::Endpoint;
use crate::domain::report::{ReportStatus, Step};
use crate::domain::secret::{ConnectionSpec, Credential, PublishResult, SecretWrite};

pub const SECRET_KIND: &str = "secret";
const SIGNING_KEY_BYTES: usize = 32;

pub const DEFERRED_DETAIL: &str = "will be updated when the referenced endpoint is ready";

pub struct SecretDistributor {
    store: Arc<dyn SecretStore>,
}

impl SecretDistributor {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Create, or update when the name is taken
    pub async fn upsert(&self, name: &str, value: &Credential) -> Result<SecretWrite, SecretStoreError> {
        match self.store.create(name, value).await {
            Ok(version) => {
                info!(secret = %name, version = %version, "Created secret");
                Ok(SecretWrite::Created(version))
            }
            Err(SecretStoreError::AlreadyExists(_)) => {
                let version = self.store.update(name, value).await?;
                info!(secret = %name, version = %version, "Updated secret");
                Ok(SecretWrite::Updated(version))
            }
            Err(err) => Err(err),
        }
    }

    /// Publish a connection string for `endpoint`, or defer while it is pending
    pub async fn publish(
        &self,
        name: &str,
        endpoint: &Endpoint,
        connection: &ConnectionSpec,
        ledger: &mut RunLedger,
    ) -> Result<PublishResult, SecretStoreError> {
        let Some(address) = endpoint.resolvable() else {
            return Ok(self.defer(name, ledger));
        };

        let value = connection.compose(address);
        let write = self.write(name, &value, ledger).await?;
        Ok(PublishResult::Published(write))
    }

    /// Skip a write for this run; nothing is sent to the store
    pub fn defer(&self, name: &str, ledger: &mut RunLedger) -> PublishResult {
        debug!(secret = %name, "Endpoint pending, deferring secret");
        ledger.record(
            Step::Secrets,
            SECRET_KIND,
            name,
            None,
            ReportStatus::Deferred(DEFERRED_DETAIL.to_string()),
        );
        PublishResult::Deferred
    }

    /// Publish the signing key, keeping the value already stored if any
    pub async fn publish_signing_key(
        &self,
        name: &str,
        ledger: &mut RunLedger,
    ) -> Result<SecretWrite, SecretStoreError> {
        let key = match self.store.get(name).await {
            Ok(Some(existing)) => existing,
            Ok(None) => Self::generate_signing_key(),
            Err(err) => {
                record_failure(ledger, name, &err);
                return Err(err);
            }
        };
        self.write(name, &key, ledger).await
    }

    /// Store the master credential of a database this run just created
    pub async fn remember_credential(
        &self,
        name: &str,
        credential: &Credential,
        ledger: &mut RunLedger,
    ) -> Result<SecretWrite, SecretStoreError> {
        self.write(name, credential, ledger).await
    }

    pub async fn recall_credential(&self, name: &str) -> Result<Option<Credential>, SecretStoreError> {
        let credential = self.store.get(name).await?;
        if credential.is_none() {
            warn!(secret = %name, "No stored credential");
        }
        Ok(credential)
    }

    pub fn generate_signing_key() -> Credential {
        let mut bytes = [0u8; SIGNING_KEY_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Credential::new(hex::encode(bytes))
    }

    async fn write(
        &self,
        name: &str,
        value: &Credential,
        ledger: &mut RunLedger,
    ) -> Result<SecretWrite, SecretStoreError> {
        match self.upsert(name, value).await {
            Ok(write) => {
                let status = match &write {
                    SecretWrite::Created(_) => ReportStatus::Published,
                    SecretWrite::Updated(_) => ReportStatus::Updated,
                };
                ledger.record(
                    Step::Secrets,
                    SECRET_KIND,
                    name,
                    Some(write.version().to_string()),
                    status,
                );
                Ok(write)
            }
            Err(err) => {
                record_failure(ledger, name, &err);
                Err(err)
            }
        }
    }
}

fn record_failure(ledger: &mut RunLedger, name: &str, err: &SecretStoreError) {
    warn!(secret = %name, error = %err, "Secret write failed");
    ledger.record(
        Step::Secrets,
        SECRET_KIND,
        name,
        None,
        ReportStatus::Failed(err.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::Phase;
    use crate::domain::resource::HostPort;
    use crate::infrastructure::in_memory::InMemorySecretStore;

    fn redis() -> ConnectionSpec {
        ConnectionSpec::Redis { database_index: 0 }
    }

    fn address() -> HostPort {
        HostPort {
            host: "cache.internal".to_string(),
            port: 6379,
        }
    }

    #[tokio::test]
    async fn test_pending_endpoint_is_never_written() {
        let store = Arc::new(InMemorySecretStore::new());
        let distributor = SecretDistributor::new(store.clone());
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");

        let pending = Endpoint::pending(Some(address()));
        let result = distributor
            .publish("p/redis-url", &pending, &redis(), &mut ledger)
            .await
            .unwrap();

        assert_eq!(result, PublishResult::Deferred);
        assert_eq!(store.write_count(), 0);
        assert!(ledger.entries()[0].status.is_waiting());
    }

    #[tokio::test]
    async fn test_available_endpoint_creates_then_updates() {
        let store = Arc::new(InMemorySecretStore::new());
        let distributor = SecretDistributor::new(store.clone());
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");
        let endpoint = Endpoint::available(address());

        let first = distributor
            .publish("p/redis-url", &endpoint, &redis(), &mut ledger)
            .await
            .unwrap();
        let second = distributor
            .publish("p/redis-url", &endpoint, &redis(), &mut ledger)
            .await
            .unwrap();

        assert!(matches!(first, PublishResult::Published(SecretWrite::Created(_))));
        assert!(matches!(second, PublishResult::Published(SecretWrite::Updated(_))));
        assert_eq!(store.secret_count(), 1);
        assert_eq!(
            store.value("p/redis-url").unwrap().expose(),
            "redis://cache.internal:6379/0"
        );
    }

    #[tokio::test]
    async fn test_signing_key_is_stable_across_runs() {
        let store = Arc::new(InMemorySecretStore::new());
        let distributor = SecretDistributor::new(store.clone());
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");

        let first = distributor.publish_signing_key("p/secret-key", &mut ledger).await.unwrap();
        let key = store.value("p/secret-key").unwrap();
        let second = distributor.publish_signing_key("p/secret-key", &mut ledger).await.unwrap();

        assert!(matches!(first, SecretWrite::Created(_)));
        assert!(matches!(second, SecretWrite::Updated(_)));
        assert_eq!(store.value("p/secret-key").unwrap(), key);
        assert_eq!(key.expose().len(), SIGNING_KEY_BYTES * 2);
    }

    #[tokio::test]
    async fn test_recall_returns_remembered_credential() {
        let store = Arc::new(InMemorySecretStore::new());
        let distributor = SecretDistributor::new(store);
        let mut ledger = RunLedger::new(Phase::NetworkTier, "p");

        assert_eq!(distributor.recall_credential("p/master").await.unwrap(), None);

        let credential = Credential::new("abc123");
        distributor
            .remember_credential("p/master", &credential, &mut ledger)
            .await
            .unwrap();
        assert_eq!(
            distributor.recall_credential("p/master").await.unwrap(),
            Some(credential)
        );
    }
}
