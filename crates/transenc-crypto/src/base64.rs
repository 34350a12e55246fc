use base64ct::{Base64, Encoding};

use crate::error::CryptoError;

/// Standard base64 encode with padding.
pub fn base64_encode(data: &[u8]) -> String {
    Base64::encode_string(data)
}

/// Standard base64 decode. Padding is required.
pub fn base64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    Base64::decode_vec(s).map_err(|e| CryptoError::Base64Decode(e.to_string()))
}
