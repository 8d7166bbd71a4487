//! Key-value persistence with an in-memory fallback.
//!
//! The core only needs `get`/`set`/`remove` on string keys. Two backends
//! implement it:
//! - [`MemoryStore`]: a plain map, used for tests and as the fallback
//! - [`FileStore`]: a JSON object on disk, written atomically under a lock
//!
//! [`FallbackStore`] combines them. It checks once at startup that the
//! durable store's directory accepts writes, without touching the data
//! file, and keeps every value in memory as well. A failing disk never
//! surfaces as an error to the caller.
//!
//! A data file that does not parse reads as empty. It is moved aside to
//! `<name>.corrupt-<millis>` before the first write replaces it.

use crate::{Error, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// String-keyed storage capability; absence reads as `None`
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// Read and parse a JSON value, falling back to `default` when the key is
/// missing or the stored text does not parse
pub fn get_json<T, S>(store: &S, key: &str, default: T) -> T
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key) else {
        return default;
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring malformed value for key {:?}: {}", key, e);
            default
        }
    }
}

/// Serialize a value as JSON under `key`
pub fn set_json<T, S>(store: &mut S, key: &str, value: &T)
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, raw),
        Err(e) => tracing::warn!("Failed to serialize value for key {:?}: {}", key, e),
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Process-lifetime map
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// ============================================================================
// File
// ============================================================================

/// JSON object file holding every key
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent(&self) -> Result<&Path> {
        self.path
            .parent()
            .ok_or_else(|| Error::Storage(format!("{:?} has no parent directory", self.path)))
    }

    /// Check that the directory accepts new files
    ///
    /// Creates and drops a scratch file next to the data file; the data file
    /// itself is never opened.
    pub fn check_writable(&self) -> Result<()> {
        let parent = self.parent()?;
        std::fs::create_dir_all(parent)?;
        let scratch = NamedTempFile::new_in(parent)?;
        scratch.close()?;
        Ok(())
    }

    fn read_contents(&self) -> Result<Contents> {
        if !self.path.exists() {
            return Ok(Contents::Missing);
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str::<HashMap<String, String>>(&contents) {
            Ok(entries) => Ok(Contents::Parsed(entries)),
            Err(e) => Ok(Contents::Corrupt(e.to_string())),
        }
    }

    /// Load every entry under a shared lock
    ///
    /// A missing file is empty. A file that does not parse is logged and
    /// treated as empty; it is left untouched on disk.
    pub fn try_read_all(&self) -> Result<HashMap<String, String>> {
        match self.read_contents()? {
            Contents::Missing => Ok(HashMap::new()),
            Contents::Parsed(entries) => Ok(entries),
            Contents::Corrupt(reason) => {
                tracing::warn!(
                    "Failed to parse storage file {:?}: {}. Treating as empty.",
                    self.path,
                    reason
                );
                Ok(HashMap::new())
            }
        }
    }

    /// Entries to build a write on
    ///
    /// A corrupt file is renamed to `<name>.corrupt-<millis>` first so the
    /// write does not destroy it.
    fn read_for_update(&self) -> Result<HashMap<String, String>> {
        match self.read_contents()? {
            Contents::Missing => Ok(HashMap::new()),
            Contents::Parsed(entries) => Ok(entries),
            Contents::Corrupt(reason) => {
                let backup = self.corrupt_backup_path();
                std::fs::rename(&self.path, &backup)?;
                tracing::warn!(
                    "Storage file {:?} does not parse ({}); moved it to {:?}",
                    self.path,
                    reason,
                    backup
                );
                Ok(HashMap::new())
            }
        }
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".corrupt-{}", Utc::now().timestamp_millis()));
        self.path.with_file_name(name)
    }

    /// Atomically replace the file with `entries`
    ///
    /// Writes a temp file in the same directory, syncs it and renames it
    /// over the original.
    pub fn try_write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let parent = self.parent()?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(entries)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} storage entries to {:?}", entries.len(), self.path);
        Ok(())
    }

    pub fn try_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.try_read_all()?.remove(key))
    }

    pub fn try_set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.read_for_update()?;
        entries.insert(key.to_string(), value);
        self.try_write_all(&entries)
    }

    pub fn try_remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_for_update()?;
        if entries.remove(key).is_some() {
            self.try_write_all(&entries)?;
        }
        Ok(())
    }
}

enum Contents {
    Missing,
    Parsed(HashMap<String, String>),
    Corrupt(String),
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.try_get(key).unwrap_or_else(|e| {
            tracing::warn!("Storage read of {:?} failed: {}", key, e);
            None
        })
    }

    fn set(&mut self, key: &str, value: String) {
        if let Err(e) = self.try_set(key, value) {
            tracing::warn!("Storage write of {:?} failed: {}", key, e);
        }
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = self.try_remove(key) {
            tracing::warn!("Storage removal of {:?} failed: {}", key, e);
        }
    }
}

// ============================================================================
// Fallback
// ============================================================================

/// Durable store mirrored in memory
///
/// Every write lands in memory first; durable failures are logged and
/// swallowed, so data stays usable for the rest of the process.
#[derive(Clone, Debug, Default)]
pub struct FallbackStore {
    memory: MemoryStore,
    durable: Option<FileStore>,
}

impl FallbackStore {
    /// Memory only, never durable
    pub fn memory_only() -> Self {
        Self::default()
    }

    /// Use the file at `path` when its directory is writable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let durable = FileStore::new(path);

        if let Err(e) = durable.check_writable() {
            tracing::warn!(
                "Storage at {:?} unavailable ({}), keeping data in memory only",
                durable.path(),
                e
            );
            return Self::memory_only();
        }

        let mut memory = MemoryStore::new();
        match durable.try_read_all() {
            Ok(entries) => {
                for (key, value) in entries {
                    memory.set(&key, value);
                }
            }
            Err(e) => tracing::warn!("Failed to seed memory from {:?}: {}", durable.path(), e),
        }

        tracing::debug!("Opened storage at {:?}", durable.path());
        Self {
            memory,
            durable: Some(durable),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }
}

impl KeyValueStore for FallbackStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(durable) = &self.durable {
            match durable.try_get(key) {
                Ok(value) => return value,
                Err(e) => tracing::warn!("Storage read of {:?} failed, using memory: {}", key, e),
            }
        }
        self.memory.get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.try_set(key, value.clone()) {
                tracing::warn!("Storage write of {:?} failed, kept in memory: {}", key, e);
            }
        }
        self.memory.set(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.memory.remove(key);
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.try_remove(key) {
                tracing::warn!("Storage removal of {:?} failed: {}", key, e);
            }
        }
    }
}
