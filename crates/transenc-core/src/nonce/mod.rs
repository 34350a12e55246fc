//! Replay protection: nonce generation and the record-if-fresh cache.
//!
//! A store must make the "seen before?" check and the insert one atomic step.
//! Two concurrent callers presenting the same nonce get exactly one `true`.
//! Once a record expires the nonce may be accepted again, so a replay older
//! than the TTL is not guaranteed to be caught.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Duration, Utc};

use crate::config::{MAX_DURATION_SECS, MAX_NONCE_LENGTH, MIN_NONCE_LENGTH};
use crate::error::{NonceStoreError, Result, TransportError};

pub use memory::MemoryNonceStore;
pub use sqlite::SqliteNonceStore;

/// A recorded nonce and its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub nonce: String,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NonceRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub trait NonceStore: Send + Sync {
    /// Record `nonce` for `ttl` unless a live record already exists.
    ///
    /// Returns `true` if recorded by this call, `false` (with no mutation) if
    /// the nonce is already live. An expired record is replaced and reported fresh.
    fn record_if_fresh(
        &self,
        nonce: &str,
        ttl: Duration,
    ) -> std::result::Result<bool, NonceStoreError>;

    /// Withdraw a reservation made by `record_if_fresh`.
    fn release(&self, nonce: &str) -> std::result::Result<(), NonceStoreError>;

    /// Whether `nonce` is currently recorded and unexpired.
    fn is_recorded(&self, nonce: &str) -> std::result::Result<bool, NonceStoreError>;

    /// Delete expired records, returning how many were removed.
    fn purge_expired(&self) -> std::result::Result<usize, NonceStoreError>;
}

/// Hex string of `length_bytes` random bytes.
pub fn generate_nonce(length_bytes: usize) -> Result<String> {
    if !(MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH).contains(&length_bytes) {
        return Err(TransportError::InvalidEnvelope(format!(
            "nonce length {} outside {}..={}",
            length_bytes, MIN_NONCE_LENGTH, MAX_NONCE_LENGTH
        )));
    }
    let mut bytes = vec![0u8; length_bytes];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| TransportError::KeyGeneration(format!("nonce entropy: {}", e)))?;
    Ok(hex::encode(bytes))
}

pub(crate) fn ttl_is_valid(ttl: Duration) -> std::result::Result<(), NonceStoreError> {
    if ttl <= Duration::zero() {
        return Err(NonceStoreError::InvalidTtl(format!(
            "{}s is not positive",
            ttl.num_seconds()
        )));
    }
    if ttl > Duration::seconds(MAX_DURATION_SECS as i64) {
        return Err(NonceStoreError::InvalidTtl(format!(
            "{}s exceeds {}s",
            ttl.num_seconds(),
            MAX_DURATION_SECS
        )));
    }
    Ok(())
}
