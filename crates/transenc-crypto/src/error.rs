use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    #[error("Invalid authentication tag length: expected {expected} bytes, got {got}")]
    InvalidTagLength { expected: usize, got: usize },

    #[error("Invalid wrapped key length: expected {expected} bytes, got {got}")]
    InvalidWrappedKeyLength { expected: usize, got: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("AES-KW wrap failed: {0}")]
    WrapFailed(String),

    #[error("AES-KW unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Corrupt compressed payload: {0}")]
    CorruptPayload(String),

    #[error("Payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Base64 decode error: {0}")]
    Base64Decode(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
