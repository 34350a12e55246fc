pub mod aead;
pub mod base64;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod key_wrap;
pub mod keypair;
pub mod signer;
pub mod types;

pub use aead::{generate_iv, open, seal, SealedPayload};
pub use base64::{base64_decode, base64_encode};
pub use codec::{compress, decompress, MAX_DECOMPRESSED_SIZE};
pub use error::CryptoError;
pub use kdf::{derive_signing_key, hkdf_derive, MIN_SIGNING_SECRET_LENGTH};
pub use key_wrap::{unwrap_key, wrap_key};
pub use keypair::{
    export_public_key_jwk, generate_secret_key, public_key_from_jwk, secret_key_from_jwk,
};
pub use signer::{sign, signing_message, verify};
pub use types::{
    SymmetricKey, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, SIGNATURE_LENGTH,
    WRAPPED_KEY_LENGTH,
};

// Re-exported so dependents name key types without a direct p256 dependency.
pub use p256::elliptic_curve::JwkEcKey;
pub use p256::{PublicKey, SecretKey};
