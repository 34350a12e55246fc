//! Payload compression applied before encryption.
//!
//! zstd at a constant level. Decompression output is capped at
//! [`MAX_DECOMPRESSED_SIZE`] so a small ciphertext cannot expand into an
//! unbounded allocation.

use std::io::Read;

use crate::error::CryptoError;

/// zstd level used for every payload.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Largest plaintext accepted by [`compress`] or produced by [`decompress`] (16 MiB).
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

/// Compress a plaintext payload.
pub fn compress(plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_DECOMPRESSED_SIZE {
        return Err(CryptoError::PayloadTooLarge {
            size: plaintext.len(),
            max: MAX_DECOMPRESSED_SIZE,
        });
    }
    zstd::encode_all(plaintext, COMPRESSION_LEVEL)
        .map_err(|e| CryptoError::CompressionFailed(e.to_string()))
}

/// Inverse of [`compress`].
///
/// Anything that is not a complete zstd frame is `CorruptPayload`.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let decoder = zstd::stream::read::Decoder::new(compressed)
        .map_err(|e| CryptoError::CorruptPayload(e.to_string()))?;

    // Read one byte past the limit to detect overflow without buffering it all
    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CryptoError::CorruptPayload(e.to_string()))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(CryptoError::PayloadTooLarge {
            size: out.len(),
            max: MAX_DECOMPRESSED_SIZE,
        });
    }
    Ok(out)
}
