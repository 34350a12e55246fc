//! Encrypt/decrypt pipeline for envelopes.
//!
//! Seal:  plaintext → compress → AES-256-GCM(content key) → wrap(content key) → sign(ct || nonce)
//! Open:  validate → verify signature → record nonce → unwrap → AES-256-GCM → decompress
//!
//! The signature is checked before the nonce store is touched, so forged
//! envelopes cannot burn nonces. The MAC does not cover the IV, tag or wrapped
//! key; if any later step fails the nonce reservation is released.

use std::sync::Arc;

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use transenc_crypto::{
    compress, decompress, derive_signing_key, generate_iv, open, seal, sign, signing_message,
    verify, CryptoError, SIGNATURE_LENGTH,
};
use zeroize::Zeroizing;

use crate::config::NonceConfig;
use crate::envelope::{DecodedEnvelope, Envelope};
use crate::error::{ConfigError, Result, TransportError};
use crate::keys::{validate_peer_id, KeyManager};
use crate::nonce::{generate_nonce, NonceStore};

const PAYLOAD_AAD_PREFIX: &str = "transenc:payload:v1\0";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Freshness {
    /// Reject nonces already seen. Used for traffic.
    Enforce,
    /// Skip the nonce store. Used for data at rest, which is read repeatedly.
    Skip,
}

/// Binds ciphertext to the peer it was sealed for.
fn payload_aad(peer_id: &str) -> Vec<u8> {
    format!("{}{}", PAYLOAD_AAD_PREFIX, peer_id).into_bytes()
}

pub struct EnvelopeProtocol {
    keys: Arc<KeyManager>,
    nonces: Arc<dyn NonceStore>,
    signing_secret: Zeroizing<Vec<u8>>,
    nonce_length: usize,
    nonce_ttl: Duration,
}

impl EnvelopeProtocol {
    /// # Arguments
    /// * `keys` - Key manager holding each peer's key pairs
    /// * `nonces` - Replay cache shared by every decrypting instance
    /// * `signing_secret` - Shared secret both parties derive signing keys from (>= 32 bytes)
    /// * `nonce` - Nonce length and TTL
    pub fn new(
        keys: Arc<KeyManager>,
        nonces: Arc<dyn NonceStore>,
        signing_secret: &[u8],
        nonce: &NonceConfig,
    ) -> Result<Self> {
        if signing_secret.len() < transenc_crypto::MIN_SIGNING_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                field: "signing_secret",
                reason: format!(
                    "must be at least {} bytes",
                    transenc_crypto::MIN_SIGNING_SECRET_LENGTH
                ),
            }
            .into());
        }
        Ok(Self {
            keys,
            nonces,
            signing_secret: Zeroizing::new(signing_secret.to_vec()),
            nonce_length: nonce.length,
            nonce_ttl: nonce.ttl(),
        })
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn nonces(&self) -> &Arc<dyn NonceStore> {
        &self.nonces
    }

    // ------------------------------------------------------------------
    // Seal
    // ------------------------------------------------------------------

    /// Seal a UTF-8 payload for `peer_id`.
    pub fn encrypt(&self, plaintext: &str, peer_id: &str) -> Result<Envelope> {
        self.encrypt_bytes(plaintext.as_bytes(), peer_id)
    }

    /// Serialize `value` as JSON and seal it.
    pub fn encrypt_json<T: Serialize>(&self, value: &T, peer_id: &str) -> Result<Envelope> {
        let json = Zeroizing::new(serde_json::to_vec(value)?);
        self.encrypt_bytes(&json, peer_id)
    }

    /// Seal arbitrary bytes for `peer_id`.
    ///
    /// Fails with `KeyNotFound` if the peer has no key pair.
    pub fn encrypt_bytes(&self, plaintext: &[u8], peer_id: &str) -> Result<Envelope> {
        validate_peer_id(peer_id)?;

        let compressed = Zeroizing::new(compress(plaintext).map_err(compression_error)?);

        let content_key = self.keys.generate_ephemeral_symmetric_key()?;
        let iv = generate_iv().map_err(|e| TransportError::KeyGeneration(e.to_string()))?;
        let sealed = seal(&content_key, &iv, &compressed, &payload_aad(peer_id))
            .map_err(|e| TransportError::EncryptionFailure(e.to_string()))?;
        let wrapped_key = self.keys.wrap_key(&content_key, peer_id)?;
        drop(content_key);

        let nonce = generate_nonce(self.nonce_length)?;
        let signing_key = self.signing_key(peer_id)?;
        let signature = sign(&signing_message(&sealed.ciphertext, &nonce), &*signing_key);

        tracing::debug!(
            peer_id,
            ciphertext_len = sealed.ciphertext.len(),
            "sealed envelope"
        );

        Ok(DecodedEnvelope {
            wrapped_key,
            ciphertext: sealed.ciphertext,
            iv,
            auth_tag: sealed.tag,
            nonce,
            signature,
        }
        .encode())
    }

    // ------------------------------------------------------------------
    // Open
    // ------------------------------------------------------------------

    /// Open an envelope received from `peer_id`, consuming its nonce.
    ///
    /// # Errors
    /// * `InvalidEnvelope` - missing field, bad encoding or wrong length
    /// * `SignatureMismatch` - MAC over `ciphertext || nonce` does not verify
    /// * `ReplayDetected` - nonce already used within its TTL
    /// * `FreshnessUnavailable` - nonce store timed out or failed
    /// * `KeyNotFound` / `DecryptionFailure` - no key could unwrap, or AEAD failed
    /// * `Compression` - decrypted payload is not a valid compressed frame
    pub fn decrypt(&self, envelope: &Envelope, peer_id: &str) -> Result<String> {
        into_utf8(self.open_logged(envelope, peer_id, Freshness::Enforce)?)
    }

    pub fn decrypt_bytes(&self, envelope: &Envelope, peer_id: &str) -> Result<Vec<u8>> {
        self.open_logged(envelope, peer_id, Freshness::Enforce)
    }

    /// Open and deserialize a JSON payload.
    pub fn decrypt_json<T: DeserializeOwned>(&self, envelope: &Envelope, peer_id: &str) -> Result<T> {
        let plaintext = Zeroizing::new(self.open_logged(envelope, peer_id, Freshness::Enforce)?);
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Open an envelope from storage. Signature and AEAD are checked as usual
    /// but the nonce is not consumed, so the same envelope can be read again.
    pub fn decrypt_stored(&self, envelope: &Envelope, peer_id: &str) -> Result<String> {
        into_utf8(self.open_logged(envelope, peer_id, Freshness::Skip)?)
    }

    fn open_logged(
        &self,
        envelope: &Envelope,
        peer_id: &str,
        freshness: Freshness,
    ) -> Result<Vec<u8>> {
        let result = self.open_envelope(envelope, peer_id, freshness);
        match &result {
            Ok(plaintext) => {
                tracing::debug!(peer_id, plaintext_len = plaintext.len(), "opened envelope")
            }
            Err(TransportError::FreshnessUnavailable(e)) => {
                tracing::error!(peer_id, error = %e, "nonce store unavailable, rejecting envelope")
            }
            Err(e) => tracing::warn!(peer_id, kind = e.kind(), "rejected envelope"),
        }
        result
    }

    fn open_envelope(
        &self,
        envelope: &Envelope,
        peer_id: &str,
        freshness: Freshness,
    ) -> Result<Vec<u8>> {
        validate_peer_id(peer_id)?;
        let decoded = envelope.decode()?;

        let signing_key = self.signing_key(peer_id)?;
        let message = signing_message(&decoded.ciphertext, &decoded.nonce);
        if !verify(&message, &decoded.signature, &*signing_key) {
            return Err(TransportError::SignatureMismatch);
        }

        if freshness == Freshness::Skip {
            return self.open_payload(&decoded, peer_id);
        }

        match self.nonces.record_if_fresh(&decoded.nonce, self.nonce_ttl) {
            Ok(true) => {}
            Ok(false) => return Err(TransportError::ReplayDetected),
            Err(e) => return Err(TransportError::FreshnessUnavailable(e)),
        }

        let opened = self.open_payload(&decoded, peer_id);
        if opened.is_err() {
            if let Err(e) = self.nonces.release(&decoded.nonce) {
                tracing::error!(peer_id, error = %e, "failed to release nonce reservation");
            }
        }
        opened
    }

    fn open_payload(&self, decoded: &DecodedEnvelope, peer_id: &str) -> Result<Vec<u8>> {
        let content_key = self.keys.unwrap_key(&decoded.wrapped_key, peer_id)?;
        let compressed = Zeroizing::new(
            open(
                &content_key,
                &decoded.iv,
                &decoded.ciphertext,
                &decoded.auth_tag,
                &payload_aad(peer_id),
            )
            .map_err(|e| TransportError::DecryptionFailure(e.to_string()))?,
        );
        drop(content_key);
        decompress(&compressed).map_err(compression_error)
    }

    fn signing_key(&self, peer_id: &str) -> Result<Zeroizing<[u8; SIGNATURE_LENGTH]>> {
        derive_signing_key(&self.signing_secret, peer_id)
            .map(Zeroizing::new)
            .map_err(|e| {
                ConfigError::Invalid {
                    field: "signing_secret",
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

fn compression_error(e: CryptoError) -> TransportError {
    TransportError::Compression(e.to_string())
}

fn into_utf8(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext).map_err(|e| {
        drop(Zeroizing::new(e.into_bytes()));
        TransportError::DecryptionFailure("payload is not valid UTF-8".to_string())
    })
}
