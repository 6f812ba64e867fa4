//! # Storage Layer
//!
//! The engine persists its durable records (audit ledger, history,
//! preferences) through a synchronous key→string store. Keys are namespaced
//! by calculator identity and record type so two calculators never share a
//! record, and every persistence operation is a full read-modify-write of
//! its logical record.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`] - HashMap-backed, used in tests and as a degraded
//!   fallback when no durable storage is wired up
//! - [`FileStore`] - one JSON file per key in a data directory, written
//!   atomically (temp file + rename) to prevent corruption on interrupt
//!
//! Concurrent writers to the same key are not coordinated; last write wins.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{DoseError, DoseResult};

/// Record types a calculator can persist, each under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Append-only audit ledger
    Ledger,
    /// History ring buffer
    History,
    /// Report preferences and professional identity
    Preferences,
}

impl RecordKind {
    fn as_str(self) -> &'static str {
        match self {
            RecordKind::Ledger => "ledger",
            RecordKind::History => "history",
            RecordKind::Preferences => "preferences",
        }
    }
}

/// Namespaced storage key: `clindose.<calculator>.<record-type>`.
///
/// Preferences are shared across calculators in the original product, so
/// [`StorageKey::shared`] builds a key with a fixed namespace instead of a
/// calculator name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    namespace: String,
    kind: RecordKind,
}

impl StorageKey {
    /// Key scoped to one calculator (ledger, history)
    pub fn scoped(calculator: impl Into<String>, kind: RecordKind) -> Self {
        StorageKey {
            namespace: calculator.into(),
            kind,
        }
    }

    /// Key shared by all calculators (preferences)
    pub fn shared(kind: RecordKind) -> Self {
        StorageKey {
            namespace: "shared".to_string(),
            kind,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clindose.{}.{}", self.namespace, self.kind.as_str())
    }
}

/// Synchronous key→string store.
///
/// `set` may fail (quota, I/O); callers treat that as a boundary error - the
/// in-memory record stays authoritative for the session.
pub trait KeyValueStore {
    fn get(&self, key: &StorageKey) -> Option<String>;
    fn set(&mut self, key: &StorageKey, value: String) -> DoseResult<()>;
    fn remove(&mut self, key: &StorageKey);
}

/// In-memory store for tests and storage-less hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> Option<String> {
        self.entries.get(&key.to_string()).cloned()
    }

    fn set(&mut self, key: &StorageKey, value: String) -> DoseResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &StorageKey) {
        self.entries.remove(&key.to_string());
    }
}

/// File-backed store: one `<key>.json` file per key in a data directory.
///
/// Writes are atomic:
/// 1. Serialize to `<key>.json.tmp`
/// 2. Sync to disk (fsync)
/// 3. Rename over the final path
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> DoseResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            DoseError::persistence(dir.display().to_string(), e.to_string())
        })?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn write_atomic(path: &Path, value: &str) -> DoseResult<()> {
        let tmp_path = path.with_extension("json.tmp");

        let mut tmp_file = File::create(&tmp_path).map_err(|e| {
            DoseError::persistence(tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.write_all(value.as_bytes()).map_err(|e| {
            DoseError::persistence(tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.sync_all().map_err(|e| {
            DoseError::persistence(tmp_path.display().to_string(), e.to_string())
        })?;

        fs::rename(&tmp_path, path).map_err(|e| {
            // Clean up temp file if rename fails
            let _ = fs::remove_file(&tmp_path);
            DoseError::persistence(path.display().to_string(), e.to_string())
        })?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &StorageKey) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &StorageKey, value: String) -> DoseResult<()> {
        Self::write_atomic(&self.path_for(key), &value)
    }

    fn remove(&mut self, key: &StorageKey) {
        let _ = fs::remove_file(self.path_for(key));
    }
}
