//! Process-local nonce cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use parking_lot::Mutex;

use super::{ttl_is_valid, NonceRecord, NonceStore};
use crate::clock::Clock;
use crate::error::NonceStoreError;

/// Expired entries are swept inline after this many inserts.
const LAZY_PURGE_INTERVAL: usize = 1024;

struct State {
    records: HashMap<String, NonceRecord>,
    inserts_since_purge: usize,
}

/// `HashMap` behind one `parking_lot::Mutex`.
///
/// Lock acquisition is bounded by `lock_timeout`; on timeout callers get
/// `NonceStoreError::Timeout` rather than blocking indefinitely.
pub struct MemoryNonceStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    lock_timeout: StdDuration,
}

impl MemoryNonceStore {
    pub fn new(clock: Arc<dyn Clock>, lock_timeout: StdDuration) -> Self {
        Self {
            state: Mutex::new(State {
                records: HashMap::new(),
                inserts_since_purge: 0,
            }),
            clock,
            lock_timeout,
        }
    }

    /// Number of records held, live or not.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, State>, NonceStoreError> {
        self.state
            .try_lock_for(self.lock_timeout)
            .ok_or(NonceStoreError::Timeout)
    }
}

impl NonceStore for MemoryNonceStore {
    fn record_if_fresh(&self, nonce: &str, ttl: Duration) -> Result<bool, NonceStoreError> {
        ttl_is_valid(ttl)?;
        let mut state = self.lock()?;
        let now = self.clock.now();

        if let Some(existing) = state.records.get(nonce) {
            if existing.is_live(now) {
                return Ok(false);
            }
        }

        state.records.insert(
            nonce.to_string(),
            NonceRecord {
                nonce: nonce.to_string(),
                recorded_at: now,
                expires_at: now + ttl,
            },
        );

        state.inserts_since_purge += 1;
        if state.inserts_since_purge >= LAZY_PURGE_INTERVAL {
            state.records.retain(|_, record| record.is_live(now));
            state.inserts_since_purge = 0;
        }
        Ok(true)
    }

    fn release(&self, nonce: &str) -> Result<(), NonceStoreError> {
        self.lock()?.records.remove(nonce);
        Ok(())
    }

    fn is_recorded(&self, nonce: &str) -> Result<bool, NonceStoreError> {
        let now = self.clock.now();
        Ok(self
            .lock()?
            .records
            .get(nonce)
            .is_some_and(|record| record.is_live(now)))
    }

    fn purge_expired(&self) -> Result<usize, NonceStoreError> {
        let mut state = self.lock()?;
        let now = self.clock.now();
        let before = state.records.len();
        state.records.retain(|_, record| record.is_live(now));
        state.inserts_since_purge = 0;
        Ok(before - state.records.len())
    }
}
