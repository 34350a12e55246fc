use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures surfaced by the envelope protocol and key lifecycle.
///
/// Messages carry identifiers and reasons only, never plaintext or key bytes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Envelope signature mismatch")]
    SignatureMismatch,

    #[error("Replay detected: nonce already used")]
    ReplayDetected,

    #[error("No key pair found for peer {peer_id}")]
    KeyNotFound { peer_id: String },

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Replay protection unavailable: {0}")]
    FreshnessUnavailable(#[source] NonceStoreError),

    #[error("Peer {peer_id} already has an active key pair")]
    KeyExists { peer_id: String },

    #[error("Key rotation is disabled")]
    RotationDisabled,

    #[error("Key record for peer {peer_id} changed concurrently")]
    ConcurrentModification { peer_id: String },

    #[error("Invalid peer id: {0:?}")]
    InvalidPeerId(String),

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Stable short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidEnvelope(_) => "invalid_envelope",
            Self::SignatureMismatch => "signature_mismatch",
            Self::ReplayDetected => "replay_detected",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::KeyGeneration(_) => "key_generation",
            Self::EncryptionFailure(_) => "encryption_failure",
            Self::DecryptionFailure(_) => "decryption_failure",
            Self::Compression(_) => "compression",
            Self::FreshnessUnavailable(_) => "freshness_unavailable",
            Self::KeyExists { .. } => "key_exists",
            Self::RotationDisabled => "rotation_disabled",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::InvalidPeerId(_) => "invalid_peer_id",
            Self::KeyStore(_) => "key_store",
            Self::Config(_) => "config",
            Self::Json(_) => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum NonceStoreError {
    #[error("Timed out waiting for the nonce store")]
    Timeout,

    #[error("Invalid nonce TTL: {0}")]
    InvalidTtl(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt key record for peer {peer_id}: {reason}")]
    Corrupt { peer_id: String, reason: String },

    #[error("Key store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported {field}: {value:?}")]
    UnsupportedAlgorithm { field: &'static str, value: String },

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
