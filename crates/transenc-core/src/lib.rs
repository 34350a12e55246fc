//! Secure message envelopes: key lifecycle, replay protection, and the
//! encrypt/decrypt pipeline.

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod nonce;
pub mod protocol;
pub mod sealed;
pub mod service;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeyRotationConfig, KeyStorageKind, NonceBackend, NonceConfig, TransportConfig};
pub use envelope::{DecodedEnvelope, Envelope};
pub use error::{ConfigError, KeyStoreError, NonceStoreError, Result, TransportError};
pub use keys::{
    FileKeyStore, KeyManager, KeyPair, KeyPairInfo, KeyState, KeyStore, MemoryKeyStore,
    PeerKeyRecord, SqliteKeyStore,
};
pub use nonce::{generate_nonce, MemoryNonceStore, NonceRecord, NonceStore, SqliteNonceStore};
pub use protocol::EnvelopeProtocol;
pub use sealed::SealedField;
pub use service::TransportService;
pub use sweeper::{spawn_key_purger, spawn_nonce_sweeper};
