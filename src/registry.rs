//! Durable file registry
//!
//! Maps CID -> file metadata for everything the user has uploaded. The
//! registry is the source of truth for known content, independent of
//! whether the bytes are currently cached locally. Every mutation is
//! flushed to a JSON file with an atomic rename before returning, so a
//! crash can only lose a write that was never acknowledged.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;

/// Current time as milliseconds since the unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Metadata for one piece of uploaded content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content identifier (deterministic over the bytes)
    pub cid: String,
    /// Filename as supplied at upload time
    pub name: String,
    /// Payload size in bytes
    pub size: u64,
    /// MIME type as supplied at upload time
    pub mime_type: String,
    /// Upload timestamp, unix milliseconds
    pub date_added: u64,
    /// Updated on every successful retrieval
    pub last_accessed: u64,
    /// Pin state as last confirmed by the node
    pub is_pinned: bool,
}

/// Durable CID -> metadata registry
///
/// Records keep insertion order; re-adding a CID replaces the existing
/// record in place (last write wins). Mutations are staged and only
/// committed to memory once the flush succeeds, so a failed flush leaves
/// the in-memory view matching what is on disk.
pub struct FileRegistry {
    /// Path of the backing JSON file
    path: PathBuf,
    /// In-memory copy; the file on disk always trails it by one flush
    records: Mutex<Vec<FileRecord>>,
}

impl FileRegistry {
    /// Open (or create) a registry at the default platform data path
    pub fn open_default() -> Result<Self, Error> {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("cidcache")
            .join("registry.json");
        Self::open(path)
    }

    /// Open (or create) a registry backed by the given file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let records = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let registry = Self {
            path,
            records: Mutex::new(records),
        };

        info!(
            path = %registry.path.display(),
            records = registry.records.lock().unwrap().len(),
            "File registry opened"
        );
        Ok(registry)
    }

    /// Insert or replace the record for a CID
    ///
    /// A replaced record keeps its position in the listing order.
    pub fn upsert(&self, record: FileRecord) -> Result<(), Error> {
        let mut records = self.records.lock().unwrap();
        let mut staged = records.clone();
        match staged.iter_mut().find(|r| r.cid == record.cid) {
            Some(existing) => {
                debug!(cid = %record.cid, "Replacing registry record");
                *existing = record;
            }
            None => {
                debug!(cid = %record.cid, name = %record.name, "New registry record");
                staged.push(record);
            }
        }
        self.flush(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Look up the record for a CID
    pub fn get(&self, cid: &str) -> Option<FileRecord> {
        self.records.lock().unwrap().iter().find(|r| r.cid == cid).cloned()
    }

    /// All records in insertion order
    pub fn list(&self) -> Vec<FileRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Update the pin flag for a CID
    ///
    /// A no-op (still flushed) if the CID is unknown.
    pub fn set_pinned(&self, cid: &str, pinned: bool) -> Result<(), Error> {
        let mut records = self.records.lock().unwrap();
        let mut staged = records.clone();
        if let Some(record) = staged.iter_mut().find(|r| r.cid == cid) {
            record.is_pinned = pinned;
            debug!(cid = cid, pinned = pinned, "Updated pin state");
        } else {
            warn!(cid = cid, "set_pinned for unknown CID");
        }
        self.flush(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Update the last-accessed timestamp for a CID
    pub fn touch(&self, cid: &str) -> Result<(), Error> {
        let mut records = self.records.lock().unwrap();
        let mut staged = records.clone();
        if let Some(record) = staged.iter_mut().find(|r| r.cid == cid) {
            record.last_accessed = now_millis();
        }
        self.flush(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Remove every record
    pub fn remove_all(&self) -> Result<(), Error> {
        let mut records = self.records.lock().unwrap();
        let count = records.len();
        self.flush(&[])?;
        records.clear();
        info!(removed = count, "Registry cleared");
        Ok(())
    }

    /// Write the full record set to disk atomically
    fn flush(&self, records: &[FileRecord]) -> Result<(), Error> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let parent = self.path.parent().unwrap_or(Path::new("/tmp"));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&data)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
