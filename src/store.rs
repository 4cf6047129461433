//! Durable key-value persistence for lock timestamps.
//!
//! A [`DurableStore`] maps string keys to f64 seconds-since-epoch values and
//! is the single source of truth for lock status. The trait is infallible by
//! contract: reads of absent (or unreadable) data yield 0.0, which decodes as
//! "already expired", and failed writes are dropped with a warning rather
//! than surfaced to lock operations.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: in-process map, primarily for tests.
//! - [`JsonFileStore`]: a single JSON object file, re-read on every access so
//!   the answer survives process restarts and reflects other writers sharing
//!   the same file within this process.

use crate::error::{Result, TimedLockError};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable string-keyed storage of f64 timestamps.
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`, or 0.0 when absent.
    fn get(&self, key: &str) -> f64;

    /// Persist `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: f64);
}

/// In-memory store. Durable only for the lifetime of the value itself; use
/// it in tests or when restart survival is not needed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value has ever been written under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .contains_key(key)
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> f64 {
        self.values
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0.0)
    }

    fn set(&self, key: &str, value: f64) {
        self.values
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(key.to_string(), value);
    }
}

/// File-backed store: one JSON object mapping keys to f64 values.
///
/// Every `get` re-reads the file and every `set` does a read-modify-write,
/// so there is no in-memory cache to go stale. Writes go to a temporary file
/// in the same directory, are synced, and then atomically replace the target,
/// ensuring the store file is never left in a partial state.
///
/// The internal mutex serializes read-modify-write cycles within this
/// process. Writers in other processes are not coordinated; last write wins
/// at the file level.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. An existing file that does not
    /// parse as a JSON object of numbers is rejected here rather than
    /// silently shadowed later.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                TimedLockError::StoreIo(format!(
                    "failed to create store directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Validate existing content up front.
        read_values(&path)?;

        Ok(Self {
            path,
            io: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_values(&self, values: &HashMap<String, f64>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| TimedLockError::StoreFormat(format!("failed to serialize store: {}", e)))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("store");
        let temp_path = self.path.with_file_name(format!(".{}.tmp", file_name));

        let mut file = File::create(&temp_path).map_err(|e| {
            TimedLockError::StoreIo(format!(
                "failed to create temp store file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;

        file.write_all(json.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            TimedLockError::StoreIo(format!("failed to write store file: {}", e))
        })?;

        file.sync_all().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            TimedLockError::StoreIo(format!("failed to sync store file: {}", e))
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            TimedLockError::StoreIo(format!(
                "failed to replace store file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl DurableStore for JsonFileStore {
    fn get(&self, key: &str) -> f64 {
        let _io = self.io.lock().unwrap_or_else(|poison| poison.into_inner());

        match read_values(&self.path) {
            Ok(values) => values.get(key).copied().unwrap_or(0.0),
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed; treating key as unset");
                0.0
            }
        }
    }

    fn set(&self, key: &str, value: f64) {
        let _io = self.io.lock().unwrap_or_else(|poison| poison.into_inner());

        let mut values = match read_values(&self.path) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "store unreadable; rewriting from scratch");
                HashMap::new()
            }
        };

        values.insert(key.to_string(), value);

        if let Err(e) = self.write_values(&values) {
            tracing::warn!(key, error = %e, "store write dropped");
        }
    }
}

/// Read the key/value map from a store file. A missing file is empty.
fn read_values(path: &Path) -> Result<HashMap<String, f64>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(TimedLockError::StoreIo(format!(
                "failed to read store file '{}': {}",
                path.display(),
                e
            )));
        }
    };

    serde_json::from_str(&content).map_err(|e| {
        TimedLockError::StoreFormat(format!(
            "failed to parse store file '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_defaults_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.get("tl-never-set"), 0.0);
        assert!(!store.contains("tl-never-set"));
    }

    #[test]
    fn memory_store_round_trips_and_overwrites() {
        let store = MemoryStore::new();
        store.set("tl-a", 1_700_000_000.5);
        assert_eq!(store.get("tl-a"), 1_700_000_000.5);

        store.set("tl-a", -62_135_769_600.0);
        assert_eq!(store.get("tl-a"), -62_135_769_600.0);
        assert!(store.contains("tl-a"));
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("locks.json")).unwrap();
        assert_eq!(store.get("tl-anything"), 0.0);
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/state/locks.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("tl-x", 42.0);
        assert!(path.exists());
    }

    #[test]
    fn file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("tl-daily-sync", 1_700_000_000.25);
            store.set("tl-other", 7.0);
        }

        // Simulates a process restart: fresh handle, same file.
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("tl-daily-sync"), 1_700_000_000.25);
        assert_eq!(store.get("tl-other"), 7.0);
    }

    #[test]
    fn file_store_set_preserves_unrelated_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("locks.json")).unwrap();

        store.set("tl-a", 1.0);
        store.set("tl-b", 2.0);
        assert_eq!(store.get("tl-a"), 1.0);
        assert_eq!(store.get("tl-b"), 2.0);
    }

    #[test]
    fn file_store_rejects_malformed_file_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(err.to_string().contains("store data malformed"));
    }

    #[test]
    fn file_store_degrades_when_file_turns_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks.json");
        let store = JsonFileStore::open(&path).unwrap();

        store.set("tl-a", 1.0);
        std::fs::write(&path, "{ corrupted").unwrap();

        // Reads fall back to "unset"; the next write recovers the file.
        assert_eq!(store.get("tl-a"), 0.0);
        store.set("tl-b", 2.0);
        assert_eq!(store.get("tl-b"), 2.0);
    }

    #[test]
    fn file_store_output_is_plain_json_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("tl-a", 1.5);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, f64> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.get("tl-a"), Some(&1.5));
    }
}
