//! HMAC-SHA256 message authentication for envelopes.
//!
//! The signed bytes are `ciphertext || nonce`, always in that order; use
//! [`signing_message`] on both sides so sign and verify see identical input.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::SIGNATURE_LENGTH;

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical byte sequence covered by an envelope signature.
pub fn signing_message(ciphertext: &[u8], nonce: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(ciphertext.len() + nonce.len());
    message.extend_from_slice(ciphertext);
    message.extend_from_slice(nonce.as_bytes());
    message
}

/// Compute HMAC-SHA256 over `message`.
pub fn sign(message: &[u8], key: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    let mut signature = [0u8; SIGNATURE_LENGTH];
    signature.copy_from_slice(&mac.finalize().into_bytes());
    signature
}

/// Verify an HMAC-SHA256 signature in constant time.
///
/// Returns false on any mismatch, including a signature of the wrong length.
pub fn verify(message: &[u8], signature: &[u8], key: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let key = [0x42u8; 32];
        let sig = sign(b"hello world", &key);
        assert!(verify(b"hello world", &sig, &key));
    }

    #[test]
    fn wrong_key_fails() {
        let sig = sign(b"hello", &[1u8; 32]);
        assert!(!verify(b"hello", &sig, &[2u8; 32]));
    }

    #[test]
    fn wrong_message_fails() {
        let key = [7u8; 32];
        let sig = sign(b"original", &key);
        assert!(!verify(b"tampered", &sig, &key));
    }

    #[test]
    fn truncated_signature_fails() {
        let key = [7u8; 32];
        let sig = sign(b"msg", &key);
        assert!(!verify(b"msg", &sig[..31], &key));
        assert!(!verify(b"msg", &[], &key));
    }

    #[test]
    fn rfc4231_test_case_2() {
        let sig = sign(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(
            hex::encode(sig),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn message_order_is_ciphertext_then_nonce() {
        let message = signing_message(&[0xde, 0xad], "beef");
        assert_eq!(message, vec![0xde, 0xad, b'b', b'e', b'e', b'f']);
    }

    #[test]
    fn nonce_is_covered() {
        let key = [9u8; 32];
        let sig = sign(&signing_message(b"ct", "aaaa"), &key);
        assert!(!verify(&signing_message(b"ct", "aaab"), &sig, &key));
    }
}
