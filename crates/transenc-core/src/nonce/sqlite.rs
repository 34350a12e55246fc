//! SQLite-backed nonce store shared by every process that opens the same file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{ttl_is_valid, NonceStore};
use crate::clock::Clock;
use crate::error::NonceStoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nonces (
        nonce       TEXT PRIMARY KEY,
        recorded_at INTEGER NOT NULL,
        expires_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS nonces_expires_at ON nonces (expires_at);
";

// A conflicting row is only overwritten once it has expired, so `changes()`
// is 1 exactly when this call claimed the nonce.
const RECORD_IF_FRESH: &str = "
    INSERT INTO nonces (nonce, recorded_at, expires_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(nonce) DO UPDATE SET
        recorded_at = excluded.recorded_at,
        expires_at  = excluded.expires_at
    WHERE nonces.expires_at <= ?2
";

/// Timestamps are stored as Unix milliseconds.
pub struct SqliteNonceStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    timeout: StdDuration,
}

impl SqliteNonceStore {
    /// Open (creating if needed) the nonce table in the database at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
        timeout: StdDuration,
    ) -> Result<Self, NonceStoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, clock, timeout)
    }

    /// Private in-memory database. Only useful for a single handle.
    pub fn open_in_memory(
        clock: Arc<dyn Clock>,
        timeout: StdDuration,
    ) -> Result<Self, NonceStoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, clock, timeout)
    }

    fn with_connection(
        conn: Connection,
        clock: Arc<dyn Clock>,
        timeout: StdDuration,
    ) -> Result<Self, NonceStoreError> {
        conn.busy_timeout(timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .map_err(map_busy)?;
        conn.execute_batch(SCHEMA).map_err(map_busy)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            timeout,
        })
    }

    fn conn(&self) -> Result<parking_lot::MutexGuard<'_, Connection>, NonceStoreError> {
        self.conn
            .try_lock_for(self.timeout)
            .ok_or(NonceStoreError::Timeout)
    }
}

fn map_busy(err: rusqlite::Error) -> NonceStoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            NonceStoreError::Timeout
        }
        _ => NonceStoreError::Sqlite(err),
    }
}

impl NonceStore for SqliteNonceStore {
    fn record_if_fresh(&self, nonce: &str, ttl: Duration) -> Result<bool, NonceStoreError> {
        ttl_is_valid(ttl)?;
        let conn = self.conn()?;
        let now = self.clock.now();
        let expires_at = now + ttl;
        let changed = conn
            .execute(
                RECORD_IF_FRESH,
                params![
                    nonce,
                    now.timestamp_millis(),
                    expires_at.timestamp_millis()
                ],
            )
            .map_err(map_busy)?;
        Ok(changed == 1)
    }

    fn release(&self, nonce: &str) -> Result<(), NonceStoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM nonces WHERE nonce = ?1", params![nonce])
            .map_err(map_busy)?;
        Ok(())
    }

    fn is_recorded(&self, nonce: &str) -> Result<bool, NonceStoreError> {
        let conn = self.conn()?;
        let now = self.clock.now().timestamp_millis();
        let found = conn
            .query_row(
                "SELECT 1 FROM nonces WHERE nonce = ?1 AND expires_at > ?2",
                params![nonce, now],
                |_| Ok(()),
            )
            .optional()
            .map_err(map_busy)?;
        Ok(found.is_some())
    }

    fn purge_expired(&self) -> Result<usize, NonceStoreError> {
        let conn = self.conn()?;
        let now = self.clock.now().timestamp_millis();
        conn.execute("DELETE FROM nonces WHERE expires_at <= ?1", params![now])
            .map_err(map_busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, SqliteNonceStore) {
        let clock = Arc::new(ManualClock::default());
        let store =
            SqliteNonceStore::open_in_memory(clock.clone(), StdDuration::from_millis(250)).unwrap();
        (clock, store)
    }

    #[test]
    fn rejects_live_duplicate() {
        let (_, store) = store();
        let ttl = Duration::seconds(300);
        assert!(store.record_if_fresh("abc", ttl).unwrap());
        assert!(!store.record_if_fresh("abc", ttl).unwrap());
        assert!(store.is_recorded("abc").unwrap());
    }

    #[test]
    fn expired_record_is_replaced() {
        let (clock, store) = store();
        assert!(store.record_if_fresh("abc", Duration::seconds(10)).unwrap());
        clock.advance(Duration::seconds(10));
        assert!(!store.is_recorded("abc").unwrap());
        assert!(store.record_if_fresh("abc", Duration::seconds(10)).unwrap());
        assert!(!store.record_if_fresh("abc", Duration::seconds(10)).unwrap());
    }

    #[test]
    fn release_and_purge() {
        let (clock, store) = store();
        store.record_if_fresh("a", Duration::seconds(5)).unwrap();
        store.record_if_fresh("b", Duration::seconds(500)).unwrap();
        store.release("b").unwrap();
        assert!(!store.is_recorded("b").unwrap());

        clock.advance(Duration::seconds(6));
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn shared_file_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonces.db");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let a = SqliteNonceStore::open(&path, clock.clone(), StdDuration::from_secs(1)).unwrap();
        let b = SqliteNonceStore::open(&path, clock, StdDuration::from_secs(1)).unwrap();

        assert!(a.record_if_fresh("shared", Duration::seconds(60)).unwrap());
        assert!(!b.record_if_fresh("shared", Duration::seconds(60)).unwrap());
        assert!(b.is_recorded("shared").unwrap());
    }
}
