//! Per-peer asymmetric key lifecycle.
//!
//! Each peer has one active P-256 key pair. Rotation demotes the active pair to
//! `previous`, which stays usable for unwrapping until its grace period ends.
//!
//! ```text
//! NoKey --generate--> Active --rotate--> Grace --expiry--> Active
//!                       ^                  |
//!                       +-----rotate-------+   (older previous discarded)
//! ```

pub mod file;
pub mod manager;
pub mod sqlite;
pub mod store;

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use transenc_crypto::{PublicKey, SecretKey};
use uuid::Uuid;

use crate::error::{Result, TransportError};

pub use file::FileKeyStore;
pub use manager::KeyManager;
pub use sqlite::SqliteKeyStore;
pub use store::{KeyStore, MemoryKeyStore, PeerKeyRecord, PreviousKey};

static PEER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@-]{0,127}$").expect("peer id pattern is valid")
});

pub fn is_valid_peer_id(peer_id: &str) -> bool {
    PEER_ID_PATTERN.is_match(peer_id)
}

/// Reject ids that could escape a key directory or collide in a table.
pub fn validate_peer_id(peer_id: &str) -> Result<()> {
    if is_valid_peer_id(peer_id) {
        Ok(())
    } else {
        Err(TransportError::InvalidPeerId(peer_id.to_string()))
    }
}

/// One generation of a peer's key material.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub peer_id: String,
    pub key_id: Uuid,
    #[serde(with = "public_jwk")]
    pub public_key: PublicKey,
    #[serde(with = "private_jwk")]
    pub private_key: SecretKey,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,
}

impl KeyPair {
    pub(crate) fn new(peer_id: &str, private_key: SecretKey, created_at: DateTime<Utc>) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            key_id: Uuid::new_v4(),
            public_key: private_key.public_key(),
            private_key,
            created_at,
            rotated_at: None,
        }
    }

    pub fn info(&self) -> KeyPairInfo {
        KeyPairInfo {
            peer_id: self.peer_id.clone(),
            key_id: self.key_id,
            created_at: self.created_at,
            rotated_at: self.rotated_at,
            public_key_jwk: transenc_crypto::export_public_key_jwk(&self.public_key),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("peer_id", &self.peer_id)
            .field("key_id", &self.key_id)
            .field("private_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}

/// Public view of a key pair, safe to log or hand to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPairInfo {
    pub peer_id: String,
    pub key_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub public_key_jwk: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    NoKey,
    Active,
    /// A rotated-out key is still accepted for decryption until `expires_at`.
    Grace { expires_at: DateTime<Utc> },
}

mod public_jwk {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use transenc_crypto::{JwkEcKey, PublicKey};

    pub fn serialize<S: Serializer>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error> {
        key.to_jwk().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PublicKey, D::Error> {
        let jwk = JwkEcKey::deserialize(deserializer)?;
        transenc_crypto::public_key_from_jwk(&jwk).map_err(D::Error::custom)
    }
}

mod private_jwk {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use transenc_crypto::{JwkEcKey, SecretKey};

    pub fn serialize<S: Serializer>(key: &SecretKey, serializer: S) -> Result<S::Ok, S::Error> {
        key.to_jwk().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretKey, D::Error> {
        let jwk = JwkEcKey::deserialize(deserializer)?;
        transenc_crypto::secret_key_from_jwk(&jwk).map_err(D::Error::custom)
    }
}
