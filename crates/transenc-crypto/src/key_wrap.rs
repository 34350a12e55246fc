//! Content-key wrapping with ECDH-ES+A256KW over P-256.
//!
//! A fresh ephemeral key pair is generated per wrap. The ECDH shared secret is
//! fed through Concat KDF (NIST SP 800-56A §5.8.1) to a 256-bit KEK, which
//! AES-KW-wraps the content key.
//!
//! Wire format: [ephemeral public key, SEC1 uncompressed:65][AES-KW(KEK, key):40]

use aes_kw::KekAes256;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::keypair::generate_secret_key;
use crate::types::{
    SymmetricKey, AES_KEY_LENGTH, AES_KW_OUTPUT_LENGTH, EPHEMERAL_PUBLIC_KEY_LENGTH,
    WRAPPED_KEY_LENGTH,
};

/// Algorithm identifier for Concat KDF (RFC 7518 §4.6.2).
const ALG_ID: &str = "ECDH-ES+A256KW";

/// Wrap `key` for the holder of `recipient`'s private key.
pub fn wrap_key(
    key: &SymmetricKey,
    recipient: &PublicKey,
) -> Result<[u8; WRAPPED_KEY_LENGTH], CryptoError> {
    let ephemeral = generate_secret_key()?;
    let ephemeral_point = ephemeral.public_key().to_encoded_point(false);

    let shared_secret =
        p256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_affine());
    let kek = derive_kek(shared_secret.raw_secret_bytes().as_slice());

    let mut wrapped = [0u8; AES_KW_OUTPUT_LENGTH];
    kek.wrap(key.as_bytes(), &mut wrapped)
        .map_err(|e| CryptoError::WrapFailed(format!("{:?}", e)))?;

    let mut result = [0u8; WRAPPED_KEY_LENGTH];
    result[..EPHEMERAL_PUBLIC_KEY_LENGTH].copy_from_slice(ephemeral_point.as_bytes());
    result[EPHEMERAL_PUBLIC_KEY_LENGTH..].copy_from_slice(&wrapped);
    Ok(result)
}

/// Recover the content key from a wrapped-key blob using `recipient`.
///
/// Fails with `UnwrapFailed` when the blob was wrapped for a different key or
/// was modified in transit (AES-KW carries its own integrity check).
pub fn unwrap_key(wrapped: &[u8], recipient: &SecretKey) -> Result<SymmetricKey, CryptoError> {
    if wrapped.len() != WRAPPED_KEY_LENGTH {
        return Err(CryptoError::InvalidWrappedKeyLength {
            expected: WRAPPED_KEY_LENGTH,
            got: wrapped.len(),
        });
    }

    let (epk_bytes, wrapped_key) = wrapped.split_at(EPHEMERAL_PUBLIC_KEY_LENGTH);
    let ephemeral_public = PublicKey::from_sec1_bytes(epk_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(format!("ephemeral key: {}", e)))?;

    let shared_secret = p256::ecdh::diffie_hellman(
        recipient.to_nonzero_scalar(),
        ephemeral_public.as_affine(),
    );
    let kek = derive_kek(shared_secret.raw_secret_bytes().as_slice());

    let mut cek = [0u8; AES_KEY_LENGTH];
    let unwrapped = kek
        .unwrap(wrapped_key, &mut cek)
        .map(|_| ())
        .map_err(|e| CryptoError::UnwrapFailed(format!("{:?}", e)));
    let key = unwrapped.and_then(|_| SymmetricKey::from_slice(&cek));
    cek.zeroize();
    key
}

fn derive_kek(shared_secret: &[u8]) -> KekAes256 {
    let mut kek_bytes = concat_kdf(shared_secret, ALG_ID, 256);
    let kek = KekAes256::from(kek_bytes);
    kek_bytes.zeroize();
    kek
}

/// Concat KDF (NIST SP 800-56A, single-pass for <=256 bits).
///
///   SHA-256(00000001 || Z || algID || partyUInfo || partyVInfo || suppPubInfo)
///
/// with algID = [len:4 BE][alg], empty party infos, suppPubInfo = [keydatalen:4 BE].
fn concat_kdf(z: &[u8], alg: &str, key_data_len_bits: u32) -> [u8; AES_KEY_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(z);
    hasher.update((alg.len() as u32).to_be_bytes());
    hasher.update(alg.as_bytes());
    hasher.update(0u32.to_be_bytes());
    hasher.update(0u32.to_be_bytes());
    hasher.update(key_data_len_bits.to_be_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let recipient = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();

        let wrapped = wrap_key(&key, &recipient.public_key()).unwrap();
        let unwrapped = unwrap_key(&wrapped, &recipient).unwrap();

        assert_eq!(unwrapped.as_bytes(), key.as_bytes());
    }

    #[test]
    fn wrapped_key_has_fixed_length() {
        let recipient = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();
        let wrapped = wrap_key(&key, &recipient.public_key()).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_LENGTH);
        assert_eq!(wrapped[0], 0x04);
    }

    #[test]
    fn fresh_ephemeral_per_wrap() {
        let recipient = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();
        let a = wrap_key(&key, &recipient.public_key()).unwrap();
        let b = wrap_key(&key, &recipient.public_key()).unwrap();
        assert_ne!(a[..], b[..]);
    }

    #[test]
    fn wrong_recipient_fails() {
        let recipient = generate_secret_key().unwrap();
        let other = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();
        let wrapped = wrap_key(&key, &recipient.public_key()).unwrap();
        let err = unwrap_key(&wrapped, &other).unwrap_err();
        assert!(matches!(err, CryptoError::UnwrapFailed(_)));
    }

    #[test]
    fn tampered_wrapped_key_fails() {
        let recipient = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();
        let mut wrapped = wrap_key(&key, &recipient.public_key()).unwrap();
        wrapped[WRAPPED_KEY_LENGTH - 1] ^= 0x01;
        assert!(unwrap_key(&wrapped, &recipient).is_err());
    }

    #[test]
    fn tampered_ephemeral_point_fails() {
        let recipient = generate_secret_key().unwrap();
        let key = SymmetricKey::generate().unwrap();
        let mut wrapped = wrap_key(&key, &recipient.public_key()).unwrap();
        wrapped[10] ^= 0x01;
        assert!(unwrap_key(&wrapped, &recipient).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        let recipient = generate_secret_key().unwrap();
        let err = unwrap_key(&[0u8; 64], &recipient).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidWrappedKeyLength { .. }));
    }

    #[test]
    fn concat_kdf_is_deterministic() {
        let z = [42u8; 32];
        assert_eq!(concat_kdf(&z, ALG_ID, 256), concat_kdf(&z, ALG_ID, 256));
        assert_ne!(concat_kdf(&z, ALG_ID, 256), concat_kdf(&z, "A256KW", 256));
    }
}
