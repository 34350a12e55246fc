//! Wires configuration, key store, nonce store and protocol together.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::{KeyStorageKind, NonceBackend, TransportConfig};
use crate::error::{ConfigError, Result, TransportError};
use crate::keys::{FileKeyStore, KeyManager, KeyStore, MemoryKeyStore, SqliteKeyStore};
use crate::nonce::{MemoryNonceStore, NonceStore, SqliteNonceStore};
use crate::protocol::EnvelopeProtocol;
use crate::sweeper;

pub struct TransportService {
    config: TransportConfig,
    keys: Arc<KeyManager>,
    nonces: Arc<dyn NonceStore>,
    protocol: Arc<EnvelopeProtocol>,
}

impl TransportService {
    /// Build every component from `config`.
    ///
    /// `key_storage: vault` has no built-in backend; use [`Self::with_key_store`].
    pub fn from_config(config: TransportConfig) -> Result<Self> {
        Self::build(config, None, Arc::new(SystemClock))
    }

    /// Build with an externally provided key store (the `vault` backend).
    pub fn with_key_store(config: TransportConfig, store: Arc<dyn KeyStore>) -> Result<Self> {
        Self::build(config, Some(store), Arc::new(SystemClock))
    }

    /// Like [`Self::from_config`] with an explicit time source.
    pub fn with_clock(
        config: TransportConfig,
        store: Option<Arc<dyn KeyStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::build(config, store, clock)
    }

    fn build(
        config: TransportConfig,
        store: Option<Arc<dyn KeyStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = match store {
            Some(store) => store,
            None => open_key_store(&config, clock.clone())?,
        };
        let nonces = open_nonce_store(&config, clock.clone())?;
        let keys = Arc::new(KeyManager::new(
            store,
            clock,
            config.key_rotation.clone(),
        ));

        let secret = config.signing_secret.decode()?;
        let protocol = Arc::new(EnvelopeProtocol::new(
            keys.clone(),
            nonces.clone(),
            &secret,
            &config.nonce,
        )?);

        tracing::info!(
            key_storage = ?config.key_storage,
            nonce_backend = ?config.nonce.backend,
            rotation_enabled = config.key_rotation.enabled,
            "transport service ready"
        );

        Ok(Self {
            config,
            keys,
            nonces,
            protocol,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn nonces(&self) -> &Arc<dyn NonceStore> {
        &self.nonces
    }

    pub fn protocol(&self) -> &Arc<EnvelopeProtocol> {
        &self.protocol
    }

    /// Start purging expired nonces in the background. Requires a tokio runtime.
    pub fn spawn_nonce_sweeper(&self, every: Duration) -> JoinHandle<()> {
        sweeper::spawn_nonce_sweeper(self.nonces.clone(), every)
    }

    /// Start dropping previous key pairs past their grace period. Requires a
    /// tokio runtime.
    pub fn spawn_key_purger(&self, every: Duration) -> JoinHandle<()> {
        sweeper::spawn_key_purger(self.keys.clone(), every)
    }
}

fn open_key_store(config: &TransportConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn KeyStore>> {
    let store: Arc<dyn KeyStore> = match config.key_storage {
        KeyStorageKind::Memory => Arc::new(MemoryKeyStore::new()),
        KeyStorageKind::File => {
            let path = config
                .key_path
                .as_ref()
                .ok_or(ConfigError::Missing("key_path"))?;
            Arc::new(FileKeyStore::open(path.clone())?)
        }
        KeyStorageKind::Database => {
            let path = config
                .database_path
                .as_ref()
                .ok_or(ConfigError::Missing("database_path"))?;
            Arc::new(SqliteKeyStore::open(path, clock)?)
        }
        KeyStorageKind::Vault => {
            return Err(ConfigError::Invalid {
                field: "key_storage",
                reason: "vault storage must be supplied with TransportService::with_key_store"
                    .to_string(),
            }
            .into())
        }
    };
    Ok(store)
}

fn open_nonce_store(
    config: &TransportConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn NonceStore>> {
    let timeout = config.nonce.timeout();
    let store: Arc<dyn NonceStore> = match config.nonce.backend {
        NonceBackend::Memory => Arc::new(MemoryNonceStore::new(clock, timeout)),
        NonceBackend::Database => {
            let path = config
                .nonce_database_path()
                .ok_or(ConfigError::Missing("nonce.database_path"))?;
            Arc::new(
                SqliteNonceStore::open(path, clock, timeout)
                    .map_err(TransportError::FreshnessUnavailable)?,
            )
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(extra: serde_json::Value) -> TransportConfig {
        let mut value = json!({
            "payload_algorithm": "AES-256-GCM",
            "key_algorithm": "ECDH-ES+A256KW/P-256",
            "key_storage": "memory",
            "signing_secret": transenc_crypto::base64_encode(&[3u8; 32]),
        });
        for (k, v) in extra.as_object().unwrap() {
            value[k] = v.clone();
        }
        TransportConfig::from_value(value).unwrap()
    }

    #[test]
    fn memory_service_round_trip() {
        let service = TransportService::from_config(config(json!({}))).unwrap();
        service.keys().generate_key_pair("c1").unwrap();
        let envelope = service.protocol().encrypt("ping", "c1").unwrap();
        assert_eq!(service.protocol().decrypt(&envelope, "c1").unwrap(), "ping");
    }

    #[test]
    fn vault_requires_injected_store() {
        let cfg = config(json!({ "key_storage": "vault" }));
        assert!(matches!(
            TransportService::from_config(cfg.clone()),
            Err(TransportError::Config(_))
        ));
        let service =
            TransportService::with_key_store(cfg, Arc::new(MemoryKeyStore::new())).unwrap();
        service.keys().generate_key_pair("c1").unwrap();
    }

    #[test]
    fn database_backends() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("transenc.db");
        let cfg = config(json!({
            "key_storage": "database",
            "database_path": db,
            "nonce": { "backend": "database" },
        }));
        let service = TransportService::from_config(cfg).unwrap();
        service.keys().generate_key_pair("c1").unwrap();
        let envelope = service.protocol().encrypt("ping", "c1").unwrap();
        service.protocol().decrypt(&envelope, "c1").unwrap();
        assert!(matches!(
            service.protocol().decrypt(&envelope, "c1"),
            Err(TransportError::ReplayDetected)
        ));
    }

    #[tokio::test]
    async fn sweeper_can_be_started() {
        let service = TransportService::from_config(config(json!({}))).unwrap();
        let handle = service.spawn_nonce_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
    }

    #[tokio::test]
    async fn key_purger_clears_previous_without_explicit_call() {
        let clock = Arc::new(crate::clock::ManualClock::default());
        let store = Arc::new(MemoryKeyStore::new());
        let service =
            TransportService::with_clock(config(json!({})), Some(store.clone()), clock.clone())
                .unwrap();
        service.keys().generate_key_pair("c1").unwrap();
        service.keys().rotate_key("c1").unwrap();
        clock.advance(chrono::Duration::seconds(86_401));

        let has_previous = || store.load("c1").unwrap().unwrap().previous.is_some();
        assert!(has_previous());
        let handle = service.spawn_key_purger(Duration::from_millis(5));
        for _ in 0..100 {
            if !has_previous() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(!has_previous());
    }
}
