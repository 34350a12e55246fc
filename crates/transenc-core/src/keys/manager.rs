use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use transenc_crypto::SymmetricKey;

use super::store::{KeyStore, PeerKeyRecord, PreviousKey};
use super::{validate_peer_id, KeyPair, KeyPairInfo, KeyState};
use crate::clock::Clock;
use crate::config::KeyRotationConfig;
use crate::error::{Result, TransportError};

/// Owns every peer's key pairs and performs wrap/unwrap with them.
///
/// Reads go through a per-peer snapshot cache (`Arc<PeerKeyRecord>`), replaced
/// whole on every mutation and re-read from the store once older than
/// `refresh_interval`. Mutations (generate, rotate, purge, delete) are
/// serialized by `writer` and persist with a conditional write before the
/// snapshot is swapped, so a manager in another process sharing the store
/// cannot be silently overwritten.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    clock: Arc<dyn Clock>,
    rotation: KeyRotationConfig,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    writer: Mutex<()>,
}

struct Snapshot {
    record: Arc<PeerKeyRecord>,
    loaded_at: DateTime<Utc>,
}

impl KeyManager {
    pub fn new(
        store: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
        rotation: KeyRotationConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rotation,
            snapshots: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn rotation(&self) -> &KeyRotationConfig {
        &self.rotation
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create and persist the first key pair for `peer_id`.
    pub fn generate_key_pair(&self, peer_id: &str) -> Result<KeyPairInfo> {
        validate_peer_id(peer_id)?;
        let _guard = self.writer.lock();

        let record = PeerKeyRecord {
            active: self.new_pair(peer_id)?,
            previous: None,
        };
        let created = self
            .store
            .save_if(&record, None)
            .map_err(|e| TransportError::KeyGeneration(e.to_string()))?;
        if !created {
            return Err(TransportError::KeyExists {
                peer_id: peer_id.to_string(),
            });
        }

        let info = record.active.info();
        self.install(record);
        tracing::info!(peer_id, key_id = %info.key_id, "generated key pair");
        Ok(info)
    }

    /// Replace the active pair, keeping the old one for the grace period.
    ///
    /// The new record is persisted in one write before the in-memory snapshot
    /// is swapped. Whatever previous pair the record held is dropped, expired
    /// or not. Fails with `ConcurrentModification` if the stored record changed
    /// between the read and the write.
    pub fn rotate_key(&self, peer_id: &str) -> Result<KeyPairInfo> {
        if !self.rotation.enabled {
            return Err(TransportError::RotationDisabled);
        }
        validate_peer_id(peer_id)?;
        let _guard = self.writer.lock();

        let current = self
            .store
            .load(peer_id)?
            .ok_or_else(|| TransportError::KeyNotFound {
                peer_id: peer_id.to_string(),
            })?;

        let now = self.clock.now();
        match &current.previous {
            Some(discarded) if discarded.expires_at > now => tracing::warn!(
                peer_id,
                key_id = %discarded.pair.key_id,
                "rotation discards a previous key still in its grace period"
            ),
            Some(discarded) => tracing::debug!(
                peer_id,
                key_id = %discarded.pair.key_id,
                "rotation purges expired previous key"
            ),
            None => {}
        }

        let expected = current.active.key_id;
        let mut demoted = current.active;
        demoted.rotated_at = Some(now);
        let record = PeerKeyRecord {
            active: self.new_pair(peer_id)?,
            previous: Some(PreviousKey {
                pair: demoted,
                expires_at: now + self.rotation.grace_period(),
            }),
        };
        if !self.store.save_if(&record, Some(expected))? {
            self.snapshots.write().remove(peer_id);
            tracing::warn!(peer_id, "key record changed during rotation");
            return Err(TransportError::ConcurrentModification {
                peer_id: peer_id.to_string(),
            });
        }

        let info = record.active.info();
        let retired = record.previous.as_ref().map(|p| p.pair.key_id);
        self.install(record);
        tracing::info!(
            peer_id,
            key_id = %info.key_id,
            retired_key_id = ?retired,
            "rotated key pair"
        );
        Ok(info)
    }

    /// Drop the previous pair once its grace period has elapsed.
    ///
    /// Returns whether anything was purged. A record rotated concurrently is
    /// left alone.
    pub fn purge_expired(&self, peer_id: &str) -> Result<bool> {
        validate_peer_id(peer_id)?;
        let _guard = self.writer.lock();

        let Some(mut record) = self.store.load(peer_id)? else {
            return Ok(false);
        };
        let now = self.clock.now();
        let expired = match &record.previous {
            Some(previous) if previous.expires_at <= now => previous.pair.key_id,
            _ => return Ok(false),
        };

        record.previous = None;
        let expected = record.active.key_id;
        if !self.store.save_if(&record, Some(expected))? {
            self.snapshots.write().remove(peer_id);
            return Ok(false);
        }
        self.install(record);
        tracing::warn!(peer_id, key_id = %expired, "purged expired previous key");
        Ok(true)
    }

    /// Purge expired previous keys for every stored peer.
    pub fn purge_all_expired(&self) -> Result<usize> {
        let mut purged = 0;
        for peer_id in self.store.list_peers()? {
            if self.purge_expired(&peer_id)? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Remove all key material for `peer_id`.
    pub fn delete_keys(&self, peer_id: &str) -> Result<bool> {
        validate_peer_id(peer_id)?;
        let _guard = self.writer.lock();

        let removed = self.store.delete(peer_id)?;
        self.snapshots.write().remove(peer_id);
        if removed {
            tracing::info!(peer_id, "deleted key pairs");
        }
        Ok(removed)
    }

    /// Discard the cached snapshot and re-read `peer_id` from the store.
    pub fn reload(&self, peer_id: &str) -> Result<KeyState> {
        validate_peer_id(peer_id)?;
        let record = self.refresh(peer_id)?;
        Ok(self.state_of(record.as_deref()))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn key_state(&self, peer_id: &str) -> Result<KeyState> {
        validate_peer_id(peer_id)?;
        let record = self.snapshot(peer_id)?;
        Ok(self.state_of(record.as_deref()))
    }

    /// Info for the active pair.
    pub fn active_key(&self, peer_id: &str) -> Result<KeyPairInfo> {
        validate_peer_id(peer_id)?;
        Ok(self.require(peer_id)?.active.info())
    }

    /// The active public key as a JWK, for distribution to the peer.
    pub fn public_key_jwk(&self, peer_id: &str) -> Result<String> {
        validate_peer_id(peer_id)?;
        let record = self.require(peer_id)?;
        Ok(transenc_crypto::export_public_key_jwk(
            &record.active.public_key,
        ))
    }

    pub fn list_peers(&self) -> Result<Vec<String>> {
        Ok(self.store.list_peers()?)
    }

    // ------------------------------------------------------------------
    // Content keys
    // ------------------------------------------------------------------

    /// Fresh 256-bit content key. Never persisted.
    pub fn generate_ephemeral_symmetric_key(&self) -> Result<SymmetricKey> {
        SymmetricKey::generate().map_err(|e| TransportError::KeyGeneration(e.to_string()))
    }

    /// Wrap `key` under the peer's active public key.
    pub fn wrap_key(&self, key: &SymmetricKey, peer_id: &str) -> Result<Vec<u8>> {
        validate_peer_id(peer_id)?;
        let record = self.require(peer_id)?;
        let wrapped = transenc_crypto::wrap_key(key, &record.active.public_key)
            .map_err(|e| TransportError::KeyGeneration(e.to_string()))?;
        tracing::debug!(peer_id, key_id = %record.active.key_id, "wrapped content key");
        Ok(wrapped.to_vec())
    }

    /// Unwrap with the active key, then the previous key if still in grace.
    ///
    /// If neither works the snapshot is re-read from the store once, in case
    /// another process rotated since it was cached. A previous pair found past
    /// its grace period at that point is purged.
    pub fn unwrap_key(&self, wrapped: &[u8], peer_id: &str) -> Result<SymmetricKey> {
        validate_peer_id(peer_id)?;
        let record = self.require(peer_id)?;
        if let Some(key) = self.try_unwrap(&record, wrapped, peer_id) {
            return Ok(key);
        }

        if let Some(fresh) = self.refresh(peer_id)? {
            if !same_generation(&record, &fresh) {
                if let Some(key) = self.try_unwrap(&fresh, wrapped, peer_id) {
                    return Ok(key);
                }
            }
            let now = self.clock.now();
            if fresh.previous.as_ref().is_some_and(|p| p.expires_at <= now) {
                if let Err(e) = self.purge_expired(peer_id) {
                    tracing::warn!(peer_id, error = %e, "failed to purge expired previous key");
                }
            }
        }

        Err(TransportError::DecryptionFailure(
            "no usable key pair could unwrap the content key".to_string(),
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn new_pair(&self, peer_id: &str) -> Result<KeyPair> {
        let secret = transenc_crypto::generate_secret_key()
            .map_err(|e| TransportError::KeyGeneration(e.to_string()))?;
        Ok(KeyPair::new(peer_id, secret, self.clock.now()))
    }

    fn try_unwrap(
        &self,
        record: &PeerKeyRecord,
        wrapped: &[u8],
        peer_id: &str,
    ) -> Option<SymmetricKey> {
        if let Ok(key) = transenc_crypto::unwrap_key(wrapped, &record.active.private_key) {
            return Some(key);
        }
        let previous = record.previous_in_grace(self.clock.now())?;
        let key = transenc_crypto::unwrap_key(wrapped, &previous.pair.private_key).ok()?;
        tracing::debug!(
            peer_id,
            key_id = %previous.pair.key_id,
            "unwrapped content key with previous key pair"
        );
        Some(key)
    }

    fn require(&self, peer_id: &str) -> Result<Arc<PeerKeyRecord>> {
        self.snapshot(peer_id)?
            .ok_or_else(|| TransportError::KeyNotFound {
                peer_id: peer_id.to_string(),
            })
    }

    /// The cached record, re-read from the store once it is older than
    /// `refresh_interval`.
    fn snapshot(&self, peer_id: &str) -> Result<Option<Arc<PeerKeyRecord>>> {
        let now = self.clock.now();
        if let Some(cached) = self.snapshots.read().get(peer_id) {
            if now - cached.loaded_at < self.rotation.refresh_interval() {
                return Ok(Some(cached.record.clone()));
            }
        }
        self.refresh(peer_id)
    }

    fn refresh(&self, peer_id: &str) -> Result<Option<Arc<PeerKeyRecord>>> {
        let _guard = self.writer.lock();
        let loaded = self.store.load(peer_id)?.map(Arc::new);
        let mut snapshots = self.snapshots.write();
        match &loaded {
            Some(record) => {
                snapshots.insert(
                    peer_id.to_string(),
                    Snapshot {
                        record: record.clone(),
                        loaded_at: self.clock.now(),
                    },
                );
            }
            None => {
                snapshots.remove(peer_id);
            }
        }
        Ok(loaded)
    }

    fn install(&self, record: PeerKeyRecord) {
        let snapshot = Snapshot {
            record: Arc::new(record),
            loaded_at: self.clock.now(),
        };
        self.snapshots
            .write()
            .insert(snapshot.record.peer_id().to_string(), snapshot);
    }

    fn state_of(&self, record: Option<&PeerKeyRecord>) -> KeyState {
        match record {
            None => KeyState::NoKey,
            Some(record) => match record.previous_in_grace(self.clock.now()) {
                Some(previous) => KeyState::Grace {
                    expires_at: previous.expires_at,
                },
                None => KeyState::Active,
            },
        }
    }
}

fn same_generation(a: &PeerKeyRecord, b: &PeerKeyRecord) -> bool {
    a.active.key_id == b.active.key_id
        && a.previous.as_ref().map(|p| p.pair.key_id) == b.previous.as_ref().map(|p| p.pair.key_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keys::MemoryKeyStore;
    use chrono::Duration;

    fn manager_with(
        rotation: KeyRotationConfig,
    ) -> (Arc<ManualClock>, Arc<MemoryKeyStore>, KeyManager) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryKeyStore::new());
        let manager = KeyManager::new(store.clone(), clock.clone(), rotation);
        (clock, store, manager)
    }

    fn manager() -> (Arc<ManualClock>, Arc<MemoryKeyStore>, KeyManager) {
        manager_with(KeyRotationConfig {
            enabled: true,
            grace_period: 3600,
            refresh_interval: 5,
        })
    }

    #[test]
    fn generate_then_wrap_unwrap() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();

        let key = km.generate_ephemeral_symmetric_key().unwrap();
        let wrapped = km.wrap_key(&key, "c1").unwrap();
        let unwrapped = km.unwrap_key(&wrapped, "c1").unwrap();
        assert_eq!(unwrapped.as_bytes(), key.as_bytes());
    }

    #[test]
    fn generate_twice_is_key_exists() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();
        assert!(matches!(
            km.generate_key_pair("c1"),
            Err(TransportError::KeyExists { .. })
        ));
    }

    #[test]
    fn missing_peer_is_key_not_found() {
        let (_, _, km) = manager();
        let key = km.generate_ephemeral_symmetric_key().unwrap();
        assert!(matches!(
            km.wrap_key(&key, "unknown-peer"),
            Err(TransportError::KeyNotFound { .. })
        ));
        assert!(matches!(
            km.unwrap_key(&[0u8; 105], "unknown-peer"),
            Err(TransportError::KeyNotFound { .. })
        ));
        assert!(matches!(
            km.rotate_key("unknown-peer"),
            Err(TransportError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn invalid_peer_id_rejected_before_storage() {
        let (_, store, km) = manager();
        assert!(matches!(
            km.generate_key_pair("../etc/passwd"),
            Err(TransportError::InvalidPeerId(_))
        ));
        assert!(store.list_peers().unwrap().is_empty());
    }

    #[test]
    fn rotation_keeps_previous_during_grace() {
        let (clock, _, km) = manager();
        let first = km.generate_key_pair("c1").unwrap();
        let key = km.generate_ephemeral_symmetric_key().unwrap();
        let old_wrapped = km.wrap_key(&key, "c1").unwrap();

        let second = km.rotate_key("c1").unwrap();
        assert_ne!(first.key_id, second.key_id);
        assert!(matches!(km.key_state("c1").unwrap(), KeyState::Grace { .. }));
        assert_eq!(
            km.unwrap_key(&old_wrapped, "c1").unwrap().as_bytes(),
            key.as_bytes()
        );

        clock.advance(Duration::seconds(3601));
        assert_eq!(km.key_state("c1").unwrap(), KeyState::Active);
        assert!(matches!(
            km.unwrap_key(&old_wrapped, "c1"),
            Err(TransportError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn new_envelopes_use_rotated_key() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();
        km.rotate_key("c1").unwrap();
        let key = km.generate_ephemeral_symmetric_key().unwrap();
        let wrapped = km.wrap_key(&key, "c1").unwrap();
        assert!(km.unwrap_key(&wrapped, "c1").is_ok());
    }

    #[test]
    fn rotating_twice_discards_oldest() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();
        let key = km.generate_ephemeral_symmetric_key().unwrap();
        let oldest = km.wrap_key(&key, "c1").unwrap();

        km.rotate_key("c1").unwrap();
        let middle = km.wrap_key(&key, "c1").unwrap();
        km.rotate_key("c1").unwrap();

        assert!(km.unwrap_key(&middle, "c1").is_ok());
        assert!(km.unwrap_key(&oldest, "c1").is_err());
    }

    #[test]
    fn rotation_disabled() {
        let (_, _, km) = manager_with(KeyRotationConfig {
            enabled: false,
            grace_period: 0,
            refresh_interval: 0,
        });
        km.generate_key_pair("c1").unwrap();
        assert!(matches!(
            km.rotate_key("c1"),
            Err(TransportError::RotationDisabled)
        ));
    }

    #[test]
    fn purge_after_grace() {
        let (clock, store, km) = manager();
        km.generate_key_pair("c1").unwrap();
        km.rotate_key("c1").unwrap();
        assert!(!km.purge_expired("c1").unwrap());

        clock.advance(Duration::hours(2));
        assert!(km.purge_expired("c1").unwrap());
        assert!(store.load("c1").unwrap().unwrap().previous.is_none());
        assert_eq!(km.purge_all_expired().unwrap(), 0);
    }

    #[test]
    fn failed_unwrap_purges_expired_previous_key() {
        let (clock, store, km) = manager();
        km.generate_key_pair("c1").unwrap();
        let key = km.generate_ephemeral_symmetric_key().unwrap();
        let old_wrapped = km.wrap_key(&key, "c1").unwrap();
        km.rotate_key("c1").unwrap();

        clock.advance(Duration::seconds(3601));
        assert!(store.load("c1").unwrap().unwrap().previous.is_some());
        assert!(km.unwrap_key(&old_wrapped, "c1").is_err());
        assert!(store.load("c1").unwrap().unwrap().previous.is_none());
    }

    #[test]
    fn rotation_replaces_expired_previous_key() {
        let (clock, store, km) = manager();
        km.generate_key_pair("c1").unwrap();
        km.rotate_key("c1").unwrap();
        let middle = km.active_key("c1").unwrap();

        clock.advance(Duration::hours(2));
        km.rotate_key("c1").unwrap();
        let stored = store.load("c1").unwrap().unwrap();
        assert_eq!(
            stored.previous.map(|p| p.pair.key_id),
            Some(middle.key_id)
        );
    }

    /// Lets another writer rotate the record right after the next load.
    struct RacingStore {
        inner: MemoryKeyStore,
        rival: Mutex<Option<PeerKeyRecord>>,
    }

    impl KeyStore for RacingStore {
        fn load(
            &self,
            peer_id: &str,
        ) -> std::result::Result<Option<PeerKeyRecord>, crate::error::KeyStoreError> {
            let loaded = self.inner.load(peer_id)?;
            if let Some(rival) = self.rival.lock().take() {
                let expected = loaded.as_ref().map(|r| r.active.key_id);
                assert!(self.inner.save_if(&rival, expected)?);
            }
            Ok(loaded)
        }

        fn save_if(
            &self,
            record: &PeerKeyRecord,
            expected_active: Option<uuid::Uuid>,
        ) -> std::result::Result<bool, crate::error::KeyStoreError> {
            self.inner.save_if(record, expected_active)
        }

        fn delete(&self, peer_id: &str) -> std::result::Result<bool, crate::error::KeyStoreError> {
            self.inner.delete(peer_id)
        }

        fn list_peers(&self) -> std::result::Result<Vec<String>, crate::error::KeyStoreError> {
            self.inner.list_peers()
        }
    }

    #[test]
    fn concurrent_rotation_is_not_overwritten() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(RacingStore {
            inner: MemoryKeyStore::new(),
            rival: Mutex::new(None),
        });
        let km = KeyManager::new(store.clone(), clock.clone(), KeyRotationConfig::default());
        km.generate_key_pair("c1").unwrap();

        let rival = KeyPair::new(
            "c1",
            transenc_crypto::generate_secret_key().unwrap(),
            clock.now(),
        );
        let rival_id = rival.key_id;
        *store.rival.lock() = Some(PeerKeyRecord {
            active: rival,
            previous: None,
        });

        let err = km.rotate_key("c1").unwrap_err();
        assert_eq!(err.kind(), "concurrent_modification");
        assert_eq!(
            store.inner.load("c1").unwrap().unwrap().active.key_id,
            rival_id
        );
        // the conflicting snapshot was dropped, so the next read sees the winner
        assert_eq!(km.active_key("c1").unwrap().key_id, rival_id);
    }

    #[test]
    fn delete_is_terminal() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();
        assert!(km.delete_keys("c1").unwrap());
        assert_eq!(km.key_state("c1").unwrap(), KeyState::NoKey);
        assert!(!km.delete_keys("c1").unwrap());
        km.generate_key_pair("c1").unwrap();
    }

    #[test]
    fn stale_snapshot_refreshed_on_unwrap_failure() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let rotation = KeyRotationConfig::default();
        let a = KeyManager::new(store.clone(), clock.clone(), rotation.clone());
        let b = KeyManager::new(store, clock, rotation);

        a.generate_key_pair("c1").unwrap();
        // b caches the first generation
        assert_eq!(b.key_state("c1").unwrap(), KeyState::Active);

        // a rotates and a sender encrypts to the new key
        a.rotate_key("c1").unwrap();
        let key = a.generate_ephemeral_symmetric_key().unwrap();
        let wrapped = a.wrap_key(&key, "c1").unwrap();

        assert_eq!(
            b.unwrap_key(&wrapped, "c1").unwrap().as_bytes(),
            key.as_bytes()
        );
        assert!(matches!(b.key_state("c1").unwrap(), KeyState::Grace { .. }));
    }

    #[test]
    fn second_manager_follows_rotation_past_grace() {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let rotation = KeyRotationConfig {
            enabled: true,
            grace_period: 3600,
            refresh_interval: 5,
        };
        let a = KeyManager::new(store.clone(), clock.clone(), rotation.clone());
        let b = KeyManager::new(store, clock.clone(), rotation);

        a.generate_key_pair("c1").unwrap();
        let first = b.active_key("c1").unwrap();

        a.rotate_key("c1").unwrap();
        clock.advance(Duration::seconds(3601));

        // b must not keep encrypting to the retired key once a has dropped it
        let current = b.active_key("c1").unwrap();
        assert_ne!(current.key_id, first.key_id);
        assert_eq!(current.key_id, a.active_key("c1").unwrap().key_id);

        let key = b.generate_ephemeral_symmetric_key().unwrap();
        let wrapped = b.wrap_key(&key, "c1").unwrap();
        assert_eq!(
            a.unwrap_key(&wrapped, "c1").unwrap().as_bytes(),
            key.as_bytes()
        );
    }

    #[test]
    fn snapshot_is_reused_within_refresh_interval() {
        let (clock, store, km) = manager();
        km.generate_key_pair("c1").unwrap();
        store.delete("c1").unwrap();

        clock.advance(Duration::seconds(4));
        assert_eq!(km.key_state("c1").unwrap(), KeyState::Active);
        clock.advance(Duration::seconds(1));
        assert_eq!(km.key_state("c1").unwrap(), KeyState::NoKey);
    }

    #[test]
    fn zero_refresh_interval_always_rereads() {
        let (_, store, km) = manager_with(KeyRotationConfig {
            enabled: true,
            grace_period: 3600,
            refresh_interval: 0,
        });
        km.generate_key_pair("c1").unwrap();
        store.delete("c1").unwrap();
        assert_eq!(km.key_state("c1").unwrap(), KeyState::NoKey);
    }

    #[test]
    fn public_key_jwk_has_no_private_part() {
        let (_, _, km) = manager();
        km.generate_key_pair("c1").unwrap();
        let jwk = km.public_key_jwk("c1").unwrap();
        assert!(jwk.contains("\"kty\":\"EC\""));
        assert!(!jwk.contains("\"d\""));
    }

    #[test]
    fn reload_reflects_external_changes() {
        let (_, store, km) = manager();
        km.generate_key_pair("c1").unwrap();
        store.delete("c1").unwrap();
        assert_eq!(km.key_state("c1").unwrap(), KeyState::Active);
        assert_eq!(km.reload("c1").unwrap(), KeyState::NoKey);
    }
}
