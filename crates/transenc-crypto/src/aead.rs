//! AES-256-GCM payload encryption with a detached tag.
//!
//! Envelopes carry the IV, ciphertext and tag as separate fields, so unlike a
//! framed blob nothing is prefixed here: the caller owns the layout.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::types::{SymmetricKey, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH};

/// Ciphertext and its detached authentication tag.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; AES_GCM_TAG_LENGTH],
}

/// Generate a random 12-byte IV for AES-GCM.
pub fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

/// Encrypt `plaintext` under `key` and `iv`, binding `aad`.
///
/// The aes-gcm crate appends the tag to the ciphertext; it is split off here.
pub fn seal(
    key: &SymmetricKey,
    iv: &[u8; AES_GCM_IV_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedPayload, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let nonce = Nonce::from_slice(iv);

    let mut combined = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // Last 16 bytes are the tag
    let tag_offset = combined.len() - AES_GCM_TAG_LENGTH;
    let mut tag = [0u8; AES_GCM_TAG_LENGTH];
    tag.copy_from_slice(&combined[tag_offset..]);
    combined.truncate(tag_offset);

    Ok(SealedPayload {
        ciphertext: combined,
        tag,
    })
}

/// Decrypt a detached-tag AES-256-GCM ciphertext.
///
/// A tag mismatch (wrong key, IV, AAD, or any tampered byte) is `DecryptionFailed`.
pub fn open(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != AES_GCM_IV_LENGTH {
        return Err(CryptoError::InvalidIvLength {
            expected: AES_GCM_IV_LENGTH,
            got: iv.len(),
        });
    }
    if tag.len() != AES_GCM_TAG_LENGTH {
        return Err(CryptoError::InvalidTagLength {
            expected: AES_GCM_TAG_LENGTH,
            got: tag.len(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
    let nonce = Nonce::from_slice(iv);

    let mut ct_with_tag = Vec::with_capacity(ciphertext.len() + AES_GCM_TAG_LENGTH);
    ct_with_tag.extend_from_slice(ciphertext);
    ct_with_tag.extend_from_slice(tag);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &ct_with_tag,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
