//! One JSON document per peer under a key directory.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::is_valid_peer_id;
use super::store::{KeyStore, PeerKeyRecord};
use crate::error::KeyStoreError;

const RECORD_EXTENSION: &str = "json";
const LOCK_FILE: &str = ".keys.lock";

/// Key records stored as `{key_path}/{peer_id}.json`.
///
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a crash mid-write leaves the old record intact. Conditional writes hold
/// an exclusive lock on `{key_path}/.keys.lock` across the compare and rename,
/// which serializes them between processes.
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, peer_id: &str) -> Result<PathBuf, KeyStoreError> {
        if !is_valid_peer_id(peer_id) {
            return Err(KeyStoreError::Backend(format!(
                "refusing to build a path for peer id {:?}",
                peer_id
            )));
        }
        Ok(self.dir.join(format!("{}.{}", peer_id, RECORD_EXTENSION)))
    }

    /// Blocks until no other handle holds the directory lock. Released when
    /// the returned file is dropped.
    fn lock(&self) -> Result<File, KeyStoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn write_record(&self, path: &Path, record: &PeerKeyRecord) -> Result<(), KeyStoreError> {
        let json = serde_json::to_vec_pretty(record)?;

        // NamedTempFile is created 0600 on Unix
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| KeyStoreError::Io(e.error))?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, peer_id: &str) -> Result<Option<PeerKeyRecord>, KeyStoreError> {
        let path = self.path_for(peer_id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: PeerKeyRecord =
            serde_json::from_str(&contents).map_err(|e| KeyStoreError::Corrupt {
                peer_id: peer_id.to_string(),
                reason: e.to_string(),
            })?;
        if record.peer_id() != peer_id {
            return Err(KeyStoreError::Corrupt {
                peer_id: peer_id.to_string(),
                reason: format!("record belongs to {:?}", record.peer_id()),
            });
        }
        Ok(Some(record))
    }

    fn save_if(
        &self,
        record: &PeerKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<bool, KeyStoreError> {
        let path = self.path_for(record.peer_id())?;
        let _lock = self.lock()?;
        let stored = self.load(record.peer_id())?.map(|r| r.active.key_id);
        if stored != expected_active {
            return Ok(false);
        }
        self.write_record(&path, record)?;
        Ok(true)
    }

    fn delete(&self, peer_id: &str) -> Result<bool, KeyStoreError> {
        let path = self.path_for(peer_id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_peers(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut peers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_peer_id(stem) {
                    peers.push(stem.to_string());
                }
            }
        }
        peers.sort();
        Ok(peers)
    }
}
