//! In-process TTL cache with a crash-safe JSON snapshot.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::errors::CacheError;

const SNAPSHOT_VERSION: u32 = 1;

/// Where the snapshot lives and how often writes are flushed to it.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub path: PathBuf,

    /// Persist after every `flush_every` cumulative writes. Zero disables
    /// write-driven flushing.
    pub flush_every: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/cache.json"),
            flush_every: 10,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    payload: Value,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age <= self.ttl,
            // created in the future relative to `now` (clock moved backwards)
            Err(_) => true,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    writes: u64,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry {
    payload: Value,
    created_at: DateTime<Utc>,
    ttl_ms: u64,
}

/// Snapshot file details reported by [`CacheStore::status`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFileStatus {
    pub path: String,
    pub exists: bool,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub file: CacheFileStatus,
}

/// Process-wide response cache.
///
/// Entries carry the TTL they were inserted with and are never returned once
/// `now - created_at > ttl`. Expired entries are dropped when looked up or by
/// [`sweep_expired`](Self::sweep_expired). The whole map is written to a JSON
/// snapshot through a temp file and an atomic rename, so a crash mid-write
/// leaves the previous snapshot intact.
pub struct CacheStore {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    // Taken before a snapshot is cut so snapshots reach the file in order.
    persist_lock: Mutex<()>,
}

impl CacheStore {
    /// Create a store backed by `config.path` and load any existing snapshot.
    pub fn open(config: CacheConfig) -> Self {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
            persist_lock: Mutex::new(()),
        };
        store.hydrate();
        store
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Cache store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_persist(&self) -> MutexGuard<'_, ()> {
        self.persist_lock.lock().unwrap_or_else(|poisoned| {
            warn!("Cache persistence lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Return the payload for `key` if present and still valid.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        match inner.entries.get(key) {
            Some(entry) if entry.is_valid(now) => Some(entry.payload.clone()),
            Some(_) => {
                inner.entries.remove(key);
                debug!("Evicted expired cache entry '{}' on lookup", key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite `key`, stamping it with the current time.
    ///
    /// Never touches the disk. Returns `true` when this write completes a
    /// batch of `flush_every` writes; the caller then runs [`flush`](Self::flush)
    /// off the async executor.
    pub fn set(&self, key: impl Into<String>, payload: Value, ttl: Duration) -> bool {
        let key = key.into();
        let mut inner = self.lock_inner();
        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: self.clock.now(),
                ttl,
            },
        );
        inner.writes += 1;
        self.config.flush_every > 0 && inner.writes % self.config.flush_every == 0
    }

    /// Drop every entry and delete the snapshot file. Returns the number of
    /// entries removed.
    pub fn invalidate_all(&self) -> usize {
        let _persist = self.lock_persist();
        let removed = {
            let mut inner = self.lock_inner();
            let removed = inner.entries.len();
            inner.entries.clear();
            removed
        };

        match fs::remove_file(&self.config.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove cache file {}: {}",
                self.config.path.display(),
                e
            ),
        }

        info!("Cache cleared ({} entries)", removed);
        removed
    }

    /// Remove all entries whose TTL has elapsed and persist if anything went.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = {
            let mut inner = self.lock_inner();
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| entry.is_valid(now));
            before - inner.entries.len()
        };

        if removed > 0 {
            info!("Cache sweep removed {} expired entries", removed);
            if let Err(e) = self.persist() {
                warn!("Cache flush after sweep failed: {}", e);
            }
        } else {
            debug!("Cache sweep found no expired entries");
        }
        removed
    }

    /// Write the whole map to the snapshot file atomically.
    pub fn persist(&self) -> Result<(), CacheError> {
        let _persist = self.lock_persist();
        let snapshot = {
            let inner = self.lock_inner();
            Snapshot {
                version: SNAPSHOT_VERSION,
                entries: inner
                    .entries
                    .iter()
                    .map(|(key, entry)| {
                        (
                            key.clone(),
                            SnapshotEntry {
                                payload: entry.payload.clone(),
                                created_at: entry.created_at,
                                ttl_ms: u64::try_from(entry.ttl.as_millis()).unwrap_or(u64::MAX),
                            },
                        )
                    })
                    .collect(),
            }
        };

        write_snapshot(&self.config.path, &snapshot)?;
        debug!(
            "Persisted {} cache entries to {}",
            snapshot.entries.len(),
            self.config.path.display()
        );
        Ok(())
    }

    /// Replace the in-memory map with the snapshot on disk.
    ///
    /// Every entry is loaded as is, including ones that expired while the
    /// process was down; those go on the next lookup or sweep. Any read or
    /// decode failure leaves the store empty.
    pub fn hydrate(&self) -> usize {
        let entries: HashMap<String, CacheEntry> = match read_snapshot(&self.config.path) {
            Ok(Some(snapshot)) => snapshot
                .entries
                .into_iter()
                .map(|(key, entry)| {
                    (
                        key,
                        CacheEntry {
                            payload: entry.payload,
                            created_at: entry.created_at,
                            ttl: Duration::from_millis(entry.ttl_ms),
                        },
                    )
                })
                .collect(),
            Ok(None) => {
                debug!(
                    "No cache file at {}, starting empty",
                    self.config.path.display()
                );
                HashMap::new()
            }
            Err(e) => {
                warn!(
                    "Failed to load cache file {}: {}. Starting with an empty cache",
                    self.config.path.display(),
                    e
                );
                HashMap::new()
            }
        };

        let loaded = entries.len();
        self.lock_inner().entries = entries;
        if loaded > 0 {
            info!("Loaded {} cache entries from disk", loaded);
        }
        loaded
    }

    /// Persist, logging instead of returning any failure.
    pub fn flush(&self) {
        if let Err(e) = self.persist() {
            warn!("Cache flush failed: {}", e);
        }
    }

    pub fn status(&self) -> CacheStatus {
        let entries = self.lock_inner().entries.len();
        let (exists, size_bytes) = match fs::metadata(&self.config.path) {
            Ok(meta) => (true, meta.len()),
            Err(_) => (false, 0),
        };

        CacheStatus {
            entries,
            file: CacheFileStatus {
                path: self.config.path.display().to_string(),
                exists,
                size_bytes,
            },
        }
    }

    /// All keys currently held, including expired entries not yet swept.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock_inner().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, CacheError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.is_empty() {
        return Ok(None);
    }

    let snapshot: Snapshot = serde_json::from_slice(&raw)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CacheError::UnsupportedVersion(snapshot.version));
    }
    Ok(Some(snapshot))
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
