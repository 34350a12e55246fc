use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// Uncompressed SEC1 P-256 point: 0x04 || x(32) || y(32).
pub const EPHEMERAL_PUBLIC_KEY_LENGTH: usize = 65;

/// AES-KW output for a 32-byte key: 32 + 8 = 40 bytes.
pub const AES_KW_OUTPUT_LENGTH: usize = 40;

/// Wrapped key wire format: [ephemeral public key:65][AES-KW(KEK, key):40] = 105 bytes.
pub const WRAPPED_KEY_LENGTH: usize = EPHEMERAL_PUBLIC_KEY_LENGTH + AES_KW_OUTPUT_LENGTH;

/// HMAC-SHA256 output length in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// A short-lived AES-256 content key.
///
/// Zeroized on drop. `Debug` never prints the key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; AES_KEY_LENGTH]);

impl SymmetricKey {
    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = [0u8; AES_KEY_LENGTH];
        getrandom::getrandom(&mut key).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let out = Self(key);
        key.zeroize();
        Ok(out)
    }

    /// Build a key from raw bytes, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; AES_KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: AES_KEY_LENGTH,
                    got: bytes.len(),
                })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = SymmetricKey::generate().unwrap();
        let b = SymmetricKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = SymmetricKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        ));
    }

    #[test]
    fn debug_is_redacted() {
        let key = SymmetricKey::from_slice(&[0x41u8; 32]).unwrap();
        let printed = format!("{:?}", key);
        assert_eq!(printed, "SymmetricKey([REDACTED])");
        assert!(!printed.contains("65"));
    }

    #[test]
    fn wrapped_key_length_is_105() {
        assert_eq!(WRAPPED_KEY_LENGTH, 105);
    }
}
