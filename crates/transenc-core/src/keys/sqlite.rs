use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::store::{KeyStore, PeerKeyRecord};
use crate::clock::Clock;
use crate::error::KeyStoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS peer_keys (
        peer_id       TEXT PRIMARY KEY,
        active_key_id TEXT NOT NULL,
        record        TEXT NOT NULL,
        updated_at    INTEGER NOT NULL
    );
";

/// Key records in a `peer_keys` table, one JSON row per peer.
///
/// `active_key_id` duplicates the record's active key id so conditional
/// writes compare in SQL. `updated_at` is Unix milliseconds from the clock.
pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteKeyStore {
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, KeyStoreError> {
        Self::with_connection(Connection::open(path)?, clock)
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, KeyStoreError> {
        Self::with_connection(Connection::open_in_memory()?, clock)
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, KeyStoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }
}

impl KeyStore for SqliteKeyStore {
    fn load(&self, peer_id: &str) -> Result<Option<PeerKeyRecord>, KeyStoreError> {
        let json: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT record FROM peer_keys WHERE peer_id = ?1",
                params![peer_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json).map_err(|e| KeyStoreError::Corrupt {
                peer_id: peer_id.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    fn save_if(
        &self,
        record: &PeerKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<bool, KeyStoreError> {
        let json = serde_json::to_string(record)?;
        let active = record.active.key_id.to_string();
        let now = self.clock.now().timestamp_millis();
        let conn = self.conn.lock();

        let changed = match expected_active {
            None => conn.execute(
                "INSERT INTO peer_keys (peer_id, active_key_id, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(peer_id) DO NOTHING",
                params![record.peer_id(), active, json, now],
            )?,
            Some(expected) => conn.execute(
                "UPDATE peer_keys
                 SET active_key_id = ?2, record = ?3, updated_at = ?4
                 WHERE peer_id = ?1 AND active_key_id = ?5",
                params![record.peer_id(), active, json, now, expected.to_string()],
            )?,
        };
        Ok(changed == 1)
    }

    fn delete(&self, peer_id: &str) -> Result<bool, KeyStoreError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM peer_keys WHERE peer_id = ?1", params![peer_id])?;
        Ok(removed > 0)
    }

    fn list_peers(&self) -> Result<Vec<String>, KeyStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT peer_id FROM peer_keys ORDER BY peer_id")?;
        let peers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(peers)
    }
}
