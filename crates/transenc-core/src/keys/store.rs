use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::KeyPair;
use crate::error::KeyStoreError;

/// Everything persisted for one peer. Written as a single unit so readers
/// never observe a half-applied rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerKeyRecord {
    pub active: KeyPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousKey {
    pub pair: KeyPair,
    pub expires_at: DateTime<Utc>,
}

impl PeerKeyRecord {
    pub fn peer_id(&self) -> &str {
        &self.active.peer_id
    }

    /// The previous pair, if still inside its grace period at `now`.
    pub fn previous_in_grace(&self, now: DateTime<Utc>) -> Option<&PreviousKey> {
        self.previous.as_ref().filter(|p| p.expires_at > now)
    }
}

/// Persistence for per-peer key records.
///
/// Writes are compare-and-swap on the active key id, so two processes sharing
/// a store cannot both rotate from the same generation.
pub trait KeyStore: Send + Sync {
    fn load(&self, peer_id: &str) -> Result<Option<PeerKeyRecord>, KeyStoreError>;

    /// Replace the whole record atomically, but only if the stored active key
    /// id equals `expected_active` (`None` means no record may exist yet).
    ///
    /// Returns whether the record was written.
    fn save_if(
        &self,
        record: &PeerKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<bool, KeyStoreError>;

    /// Returns whether a record existed.
    fn delete(&self, peer_id: &str) -> Result<bool, KeyStoreError>;

    fn list_peers(&self) -> Result<Vec<String>, KeyStoreError>;
}

/// Non-persistent store for tests and single-process use.
#[derive(Default)]
pub struct MemoryKeyStore {
    records: Mutex<HashMap<String, PeerKeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, peer_id: &str) -> Result<Option<PeerKeyRecord>, KeyStoreError> {
        Ok(self.records.lock().get(peer_id).cloned())
    }

    fn save_if(
        &self,
        record: &PeerKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<bool, KeyStoreError> {
        let mut records = self.records.lock();
        let stored = records.get(record.peer_id()).map(|r| r.active.key_id);
        if stored != expected_active {
            return Ok(false);
        }
        records.insert(record.peer_id().to_string(), record.clone());
        Ok(true)
    }

    fn delete(&self, peer_id: &str) -> Result<bool, KeyStoreError> {
        Ok(self.records.lock().remove(peer_id).is_some())
    }

    fn list_peers(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut peers: Vec<String> = self.records.lock().keys().cloned().collect();
        peers.sort();
        Ok(peers)
    }
}
