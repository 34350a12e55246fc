//! HKDF-SHA256 key derivation.
//!
//! signingKey = HKDF-SHA256(secret, salt="transenc:signing-salt:v1", info="transenc:signing:v1\0{peerId}")

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

const SIGNING_SALT: &[u8] = b"transenc:signing-salt:v1";
const SIGNING_INFO_PREFIX: &str = "transenc:signing:v1\0";

/// Shortest shared secret accepted for signing-key derivation.
pub const MIN_SIGNING_SECRET_LENGTH: usize = 32;

/// Derive a 256-bit key using HKDF-SHA256.
pub fn hkdf_derive(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; AES_KEY_LENGTH];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivationFailed(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Derive the HMAC key used to sign envelopes exchanged with `peer_id`.
///
/// Both parties hold the same `secret`, so both derive the same key.
pub fn derive_signing_key(
    secret: &[u8],
    peer_id: &str,
) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    if secret.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: MIN_SIGNING_SECRET_LENGTH,
            got: secret.len(),
        });
    }
    let info = format!("{}{}", SIGNING_INFO_PREFIX, peer_id);
    hkdf_derive(secret, SIGNING_SALT, info.as_bytes())
}
