//! P-256 key pair generation and JWK conversion.

use p256::elliptic_curve::JwkEcKey;
use p256::{PublicKey, SecretKey};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Scalars outside [1, n) are rejected by `SecretKey::from_slice`; the chance
/// of drawing one is ~2^-32, so a handful of attempts is plenty.
const MAX_KEYGEN_ATTEMPTS: usize = 8;

/// Generate a new P-256 secret key from the OS RNG.
///
/// Unlike `SecretKey::random`, an RNG failure is returned instead of panicking.
pub fn generate_secret_key() -> Result<SecretKey, CryptoError> {
    for _ in 0..MAX_KEYGEN_ATTEMPTS {
        let mut scalar = [0u8; 32];
        getrandom::getrandom(&mut scalar).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let candidate = SecretKey::from_slice(&scalar);
        scalar.zeroize();
        if let Ok(secret) = candidate {
            return Ok(secret);
        }
    }
    Err(CryptoError::InvalidPrivateKey(
        "failed to draw a valid P-256 scalar".to_string(),
    ))
}

/// Export a P-256 public key as a JWK JSON string.
pub fn export_public_key_jwk(key: &PublicKey) -> String {
    key.to_jwk_string()
}

/// Parse a P-256 public key from a JWK.
pub fn public_key_from_jwk(jwk: &JwkEcKey) -> Result<PublicKey, CryptoError> {
    PublicKey::from_jwk(jwk).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Parse a P-256 secret key from a JWK carrying `d`.
pub fn secret_key_from_jwk(jwk: &JwkEcKey) -> Result<SecretKey, CryptoError> {
    SecretKey::from_jwk(jwk).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}
