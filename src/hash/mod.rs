//! Content fingerprints keyed by modification time and length.
//!
//! `fingerprint` only re-reads a file when its mtime or size moved, so a notify burst
//! over an unchanged file costs one `stat` per event. The empty string is the
//! "deleted" signal shared with the watcher and the wire protocol.

use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone)]
struct CacheEntry {
    hash: String,
    mtime: SystemTime,
    len: u64,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCacheStats {
    pub cached_entries: usize,
}

#[derive(Debug, Default)]
pub struct ContentHashCache {
    entries: DashMap<PathBuf, CacheEntry>,
}

impl ContentHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint the current content of `path`.
    ///
    /// Returns the empty string when the file is gone or unreadable; the cached
    /// entry is dropped in that case. Never fails.
    pub fn fingerprint(&self, path: &Path) -> String {
        // mtime granularity can be coarse; size catches most same-tick rewrites
        let (mtime, len) = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => (
                meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                meta.len(),
            ),
            Ok(_) => {
                self.entries.remove(path);
                return String::new();
            }
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("[hmr:hash] Failed to stat {}: {}", path.display(), e);
                }
                self.entries.remove(path);
                return String::new();
            }
        };

        if let Some(entry) = self.entries.get(path) {
            if entry.mtime == mtime && entry.len == len {
                return entry.hash.clone();
            }
        }

        match fs::read(path) {
            Ok(bytes) => {
                let hash = hash_bytes(&bytes);
                self.entries.insert(
                    path.to_path_buf(),
                    CacheEntry {
                        hash: hash.clone(),
                        mtime,
                        len,
                    },
                );
                hash
            }
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("[hmr:hash] Failed to read {}: {}", path.display(), e);
                }
                self.entries.remove(path);
                String::new()
            }
        }
    }

    /// Drop the entry for `path`, or every entry when `path` is `None`.
    pub fn invalidate(&self, path: Option<&Path>) {
        match path {
            Some(path) => {
                self.entries.remove(path);
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> HashCacheStats {
        HashCacheStats {
            cached_entries: self.entries.len(),
        }
    }
}

/// Hex-encoded xxh3 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:016x}", xxh3_64(bytes))
}
