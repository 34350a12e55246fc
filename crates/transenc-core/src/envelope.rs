//! Envelope wire format.
//!
//! ```json
//! { "key": b64, "payload": b64, "iv": b64, "tag": b64, "nonce": hex, "signature": hex }
//! ```
//!
//! Binary fields use standard padded base64. Missing fields deserialize as
//! empty strings so that structural problems surface from [`Envelope::decode`]
//! as `InvalidEnvelope` rather than as a JSON error.

use serde::{Deserialize, Serialize};
use transenc_crypto::{
    base64_decode, base64_encode, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, SIGNATURE_LENGTH,
    WRAPPED_KEY_LENGTH,
};

use crate::config::{MAX_NONCE_LENGTH, MIN_NONCE_LENGTH};
use crate::error::{Result, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "key", default)]
    pub wrapped_key: String,
    #[serde(rename = "payload", default)]
    pub ciphertext: String,
    #[serde(default)]
    pub iv: String,
    #[serde(rename = "tag", default)]
    pub auth_tag: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: String,
}

/// An envelope whose fields have been decoded and length-checked.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    pub wrapped_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub iv: [u8; AES_GCM_IV_LENGTH],
    pub auth_tag: [u8; AES_GCM_TAG_LENGTH],
    pub nonce: String,
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl Envelope {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TransportError::InvalidEnvelope(format!("malformed JSON: {}", e)))
    }

    /// Validate presence, encodings and fixed lengths of every field.
    pub fn decode(&self) -> Result<DecodedEnvelope> {
        let wrapped_key = decode_b64("key", &self.wrapped_key)?;
        if wrapped_key.len() != WRAPPED_KEY_LENGTH {
            return Err(length_error("key", WRAPPED_KEY_LENGTH, wrapped_key.len()));
        }

        let ciphertext = decode_b64("payload", &self.ciphertext)?;
        let iv = decode_fixed::<AES_GCM_IV_LENGTH>("iv", &decode_b64("iv", &self.iv)?)?;
        let auth_tag =
            decode_fixed::<AES_GCM_TAG_LENGTH>("tag", &decode_b64("tag", &self.auth_tag)?)?;

        require_present("nonce", &self.nonce)?;
        let nonce_bytes = hex::decode(&self.nonce)
            .map_err(|e| TransportError::InvalidEnvelope(format!("nonce: {}", e)))?;
        if !(MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH).contains(&nonce_bytes.len()) {
            return Err(TransportError::InvalidEnvelope(format!(
                "nonce: {} bytes outside {}..={}",
                nonce_bytes.len(),
                MIN_NONCE_LENGTH,
                MAX_NONCE_LENGTH
            )));
        }

        require_present("signature", &self.signature)?;
        let signature_bytes = hex::decode(&self.signature)
            .map_err(|e| TransportError::InvalidEnvelope(format!("signature: {}", e)))?;
        let signature = decode_fixed::<SIGNATURE_LENGTH>("signature", &signature_bytes)?;

        Ok(DecodedEnvelope {
            wrapped_key,
            ciphertext,
            iv,
            auth_tag,
            // Signed bytes are the nonce text, so keep it exactly as received
            nonce: self.nonce.clone(),
            signature,
        })
    }
}

impl DecodedEnvelope {
    pub fn encode(&self) -> Envelope {
        Envelope {
            wrapped_key: base64_encode(&self.wrapped_key),
            ciphertext: base64_encode(&self.ciphertext),
            iv: base64_encode(&self.iv),
            auth_tag: base64_encode(&self.auth_tag),
            nonce: self.nonce.clone(),
            signature: hex::encode(self.signature),
        }
    }
}

fn require_present(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TransportError::InvalidEnvelope(format!(
            "missing field {}",
            field
        )));
    }
    Ok(())
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>> {
    require_present(field, value)?;
    base64_decode(value).map_err(|e| TransportError::InvalidEnvelope(format!("{}: {}", field, e)))
}

fn decode_fixed<const N: usize>(field: &str, bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| length_error(field, N, bytes.len()))
}

fn length_error(field: &str, expected: usize, got: usize) -> TransportError {
    TransportError::InvalidEnvelope(format!(
        "{}: expected {} bytes, got {}",
        field, expected, got
    ))
}
