//! Persistence for the dismissal record.
//!
//! The selector only talks to the [`DismissalStore`] trait. The record is a
//! set of rule identities, stored as a JSON array of strings.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::data_dir;
use crate::error::{CoreError, StoreError};

/// File name of the record inside the data directory.
pub const DISMISSED_FILE: &str = "dismissed_nudges.json";

/// Durable storage for dismissed rule identities.
pub trait DismissalStore: Send + Sync {
    /// Load the record. A missing record is an empty set.
    fn load(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Persist `dismissed`. Identities are only removed by [`clear`];
    /// a store shared between processes keeps what other writers recorded.
    ///
    /// [`clear`]: DismissalStore::clear
    fn save(&self, dismissed: &BTreeSet<String>) -> Result<(), StoreError>;

    /// Remove the persisted record.
    fn clear(&self) -> Result<(), StoreError>;
}

/// JSON-array file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `<data_dir>/dismissed_nudges.json`.
    pub fn open() -> Result<Self, CoreError> {
        Ok(Self {
            path: data_dir()?.join(DISMISSED_FILE),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DISMISSED_FILE.into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl DismissalStore for JsonFileStore {
    fn load(&self) -> Result<BTreeSet<String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeSet::new());
        }

        let ids: Vec<String> = serde_json::from_str(&content)?;
        Ok(ids.into_iter().collect())
    }

    fn save(&self, dismissed: &BTreeSet<String>) -> Result<(), StoreError> {
        let write_failed = |source| StoreError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_failed)?;
            }
        }

        // Another process may have dismissed something since our last load.
        let mut merged = match self.load() {
            Ok(on_disk) => on_disk,
            Err(e) => {
                warn!(error = %e, "Overwriting unreadable dismissal record");
                BTreeSet::new()
            }
        };
        merged.extend(dismissed.iter().cloned());

        let content = serde_json::to_string(&merged)?;
        // Write-then-rename so an abrupt exit never leaves a torn record.
        let temp = self.temp_path();
        std::fs::write(&temp, content).map_err(write_failed)?;
        std::fs::rename(&temp, &self.path).map_err(write_failed)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::WriteFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-memory store. Clones share the same record, so a clone handed to a
/// second selector behaves like the same store after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Arc<Mutex<Option<BTreeSet<String>>>>,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `ids`.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        if let Ok(mut record) = store.record.lock() {
            *record = Some(ids.into_iter().map(Into::into).collect());
        }
        store
    }

    /// Make subsequent `save`/`clear` calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `load` calls fail as if the record were corrupt.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Current persisted contents (empty if nothing was saved).
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.record
            .lock()
            .ok()
            .and_then(|record| record.clone())
            .unwrap_or_default()
    }

    /// Whether a record has been persisted and not cleared.
    pub fn is_persisted(&self) -> bool {
        self.record.lock().map(|r| r.is_some()).unwrap_or(false)
    }
}

impl DismissalStore for MemoryStore {
    fn load(&self) -> Result<BTreeSet<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated read failure".into()));
        }
        let record = self
            .record
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(record.clone().unwrap_or_default())
    }

    fn save(&self, dismissed: &BTreeSet<String>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        let mut record = self
            .record
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *record = Some(dismissed.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        let mut record = self
            .record
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *record = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_path(dir.path().join(DISMISSED_FILE));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_persists_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(DISMISSED_FILE);
        let store = JsonFileStore::with_path(&path);

        store.save(&set(&["welcome", "idle-reminder-1"])).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"["idle-reminder-1","welcome"]"#);

        let reopened = JsonFileStore::with_path(&path);
        assert_eq!(reopened.load().unwrap(), set(&["welcome", "idle-reminder-1"]));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn save_keeps_identities_from_other_writers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DISMISSED_FILE);
        let running = JsonFileStore::with_path(&path);
        let other = JsonFileStore::with_path(&path);

        running.save(&set(&["welcome"])).unwrap();
        other.save(&set(&["idle-reminder-2"])).unwrap();
        running.save(&set(&["welcome", "first-steps"])).unwrap();

        assert_eq!(
            running.load().unwrap(),
            set(&["welcome", "first-steps", "idle-reminder-2"])
        );
    }

    #[test]
    fn save_replaces_malformed_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DISMISSED_FILE);
        std::fs::write(&path, "{corrupt").unwrap();
        let store = JsonFileStore::with_path(&path);
        store.save(&set(&["welcome"])).unwrap();
        assert_eq!(store.load().unwrap(), set(&["welcome"]));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DISMISSED_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::with_path(&path);
        assert!(matches!(store.load(), Err(StoreError::Malformed(_))));

        std::fs::write(&path, r#"{"welcome": true}"#).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn blank_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DISMISSED_FILE);
        std::fs::write(&path, "  \n").unwrap();
        assert!(JsonFileStore::with_path(&path).load().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DISMISSED_FILE);
        let store = JsonFileStore::with_path(&path);
        store.save(&set(&["a"])).unwrap();
        store.clear().unwrap();
        assert!(!path.exists());
        store.clear().unwrap();
    }

    #[test]
    fn memory_store_clones_share_record() {
        let store = MemoryStore::new();
        let restarted = store.clone();
        store.save(&set(&["welcome"])).unwrap();
        assert_eq!(restarted.load().unwrap(), set(&["welcome"]));
        assert!(restarted.is_persisted());

        restarted.clear().unwrap();
        assert!(!store.is_persisted());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn memory_store_simulated_failures() {
        let store = MemoryStore::with_ids(["a"]);
        store.set_fail_writes(true);
        assert!(store.save(&set(&["b"])).is_err());
        assert_eq!(store.snapshot(), set(&["a"]));

        store.set_fail_reads(true);
        assert!(store.load().is_err());
    }
}
