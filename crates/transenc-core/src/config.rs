//! Transport configuration.
//!
//! Parsed from JSON with unknown fields rejected, then validated once. Reading
//! the document from disk or the environment is left to the caller.

use std::fmt;
use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::ConfigError;

pub const PAYLOAD_ALGORITHM: &str = "AES-256-GCM";
pub const KEY_ALGORITHM: &str = "ECDH-ES+A256KW/P-256";

pub const MIN_NONCE_LENGTH: usize = 8;
pub const MAX_NONCE_LENGTH: usize = 64;

/// Upper bound for TTL and grace-period settings (100 years), keeping
/// timestamp arithmetic far from chrono's range limits.
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStorageKind {
    File,
    Database,
    /// Externally provided store, injected at construction.
    Vault,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceBackend {
    #[default]
    Memory,
    Database,
}

/// Base64 shared secret. `Debug` is redacted.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Decoded secret bytes.
    pub fn decode(&self) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        transenc_crypto::base64_decode(&self.0)
            .map(Zeroizing::new)
            .map_err(|e| ConfigError::Invalid {
                field: "signing_secret",
                reason: e.to_string(),
            })
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NonceConfig {
    /// Random bytes per nonce (hex doubles the string length).
    pub length: usize,
    /// Seconds a nonce stays recorded.
    pub ttl: u64,
    pub backend: NonceBackend,
    /// Falls back to the top-level `database_path` when unset.
    pub database_path: Option<PathBuf>,
    /// Upper bound on waiting for the nonce store lock or SQLite busy handler.
    pub timeout_ms: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            length: 16,
            ttl: 300,
            backend: NonceBackend::Memory,
            database_path: None,
            timeout_ms: 250,
        }
    }
}

impl NonceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl.min(MAX_DURATION_SECS) as i64)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct KeyRotationConfig {
    pub enabled: bool,
    /// Seconds a rotated-out key remains usable for decryption.
    pub grace_period: u64,
    /// Seconds a cached key record is trusted before it is re-read from the
    /// store, so rotations made by other processes become visible. 0 re-reads
    /// on every use.
    pub refresh_interval: u64,
}

impl Default for KeyRotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period: 86_400,
            refresh_interval: 5,
        }
    }
}

impl KeyRotationConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::seconds(self.grace_period.min(MAX_DURATION_SECS) as i64)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::seconds(self.refresh_interval.min(MAX_DURATION_SECS) as i64)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    pub payload_algorithm: String,
    pub key_algorithm: String,
    pub key_storage: KeyStorageKind,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    pub signing_secret: SigningSecret,
    #[serde(default)]
    pub nonce: NonceConfig,
    #[serde(default)]
    pub key_rotation: KeyRotationConfig,
}

impl TransportConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_algorithm != PAYLOAD_ALGORITHM {
            return Err(ConfigError::UnsupportedAlgorithm {
                field: "payload_algorithm",
                value: self.payload_algorithm.clone(),
            });
        }
        if self.key_algorithm != KEY_ALGORITHM {
            return Err(ConfigError::UnsupportedAlgorithm {
                field: "key_algorithm",
                value: self.key_algorithm.clone(),
            });
        }

        match self.key_storage {
            KeyStorageKind::File if self.key_path.is_none() => {
                return Err(ConfigError::Missing("key_path"))
            }
            KeyStorageKind::Database if self.database_path.is_none() => {
                return Err(ConfigError::Missing("database_path"))
            }
            _ => {}
        }

        let secret = self.signing_secret.decode()?;
        if secret.len() < transenc_crypto::MIN_SIGNING_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                field: "signing_secret",
                reason: format!(
                    "must decode to at least {} bytes, got {}",
                    transenc_crypto::MIN_SIGNING_SECRET_LENGTH,
                    secret.len()
                ),
            });
        }

        if !(MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH).contains(&self.nonce.length) {
            return Err(ConfigError::Invalid {
                field: "nonce.length",
                reason: format!(
                    "must be between {} and {} bytes",
                    MIN_NONCE_LENGTH, MAX_NONCE_LENGTH
                ),
            });
        }
        if self.nonce.ttl == 0 {
            return Err(ConfigError::Invalid {
                field: "nonce.ttl",
                reason: "must be positive".to_string(),
            });
        }
        if self.nonce.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "nonce.timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.nonce.backend == NonceBackend::Database && self.nonce_database_path().is_none() {
            return Err(ConfigError::Missing("nonce.database_path"));
        }
        if self.nonce.ttl > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid {
                field: "nonce.ttl",
                reason: format!("must not exceed {} seconds", MAX_DURATION_SECS),
            });
        }
        if self.key_rotation.grace_period > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid {
                field: "key_rotation.grace_period",
                reason: format!("must not exceed {} seconds", MAX_DURATION_SECS),
            });
        }
        if self.key_rotation.refresh_interval > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid {
                field: "key_rotation.refresh_interval",
                reason: format!("must not exceed {} seconds", MAX_DURATION_SECS),
            });
        }
        Ok(())
    }

    /// Database used by the nonce store when `nonce.backend` is `database`.
    pub fn nonce_database_path(&self) -> Option<&PathBuf> {
        self.nonce
            .database_path
            .as_ref()
            .or(self.database_path.as_ref())
    }
}
