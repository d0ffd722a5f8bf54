//! Cache store
//!
//! One directory of framed, compressed entries, shared by mechanism across
//! the three caches (compilation metadata, call-graph fragments, project
//! metadata). Entries are single-writer multi-reader: a per-key mutex
//! serializes writes, reads validate the integrity stamp instead of locking,
//! and every write lands via temp-then-rename so torn files never surface
//! under their final name.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use ahash::AHashMap;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::entry::{self, CacheEntryHeader, DEFAULT_COMPRESSION_LEVEL};
use crate::cache::write_atomic;
use crate::error::Result;
use crate::hashing::hash_hex;

/// Size, age, and disk-floor limits, derived from solution scale
#[derive(Debug, Clone, Copy)]
pub struct CacheTier {
    /// Hard cap on total on-disk bytes per solution
    pub max_bytes: u64,

    /// Entries older than this are evicted on maintenance
    pub max_age: StdDuration,

    /// Minimum free bytes on the cache volume before writes are refused
    pub disk_floor_bytes: u64,
}

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;
const DAY: u64 = 24 * 60 * 60;

impl CacheTier {
    /// Tier selection by project count
    pub fn for_project_count(projects: usize) -> Self {
        match projects {
            0..=10 => Self {
                max_bytes: GIB,
                max_age: StdDuration::from_secs(30 * DAY),
                disk_floor_bytes: 5 * GIB,
            },
            11..=40 => Self {
                max_bytes: 500 * MIB,
                max_age: StdDuration::from_secs(30 * DAY),
                disk_floor_bytes: 10 * GIB,
            },
            41..=99 => Self {
                max_bytes: 500 * MIB,
                max_age: StdDuration::from_secs(14 * DAY),
                disk_floor_bytes: 15 * GIB,
            },
            _ => Self {
                max_bytes: 250 * MIB,
                max_age: StdDuration::from_secs(7 * DAY),
                disk_floor_bytes: 20 * GIB,
            },
        }
    }
}

/// Counters exposed by every store
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Average compression ratio (uncompressed / compressed)
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            1.0
        } else {
            self.uncompressed_bytes as f64 / self.compressed_bytes as f64
        }
    }
}

/// Free-bytes probe for the disk-space guard; swappable for tests
pub type DiskProbe = Arc<dyn Fn(&Path) -> Option<u64> + Send + Sync>;

/// Probe backed by the system disk table
pub fn system_disk_probe() -> DiskProbe {
    Arc::new(|path: &Path| {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.available_space())
    })
}

/// One on-disk cache directory
pub struct CacheStore {
    name: &'static str,
    dir: PathBuf,
    tier: CacheTier,
    compression_level: u32,
    write_locks: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
    size_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    uncompressed_bytes: AtomicU64,
    disk_probe: DiskProbe,
}

impl CacheStore {
    /// Open (and create) a store directory
    pub fn open(name: &'static str, dir: PathBuf, tier: CacheTier) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let store = Self {
            name,
            dir,
            tier,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            write_locks: Mutex::new(AHashMap::new()),
            size_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            uncompressed_bytes: AtomicU64::new(0),
            disk_probe: system_disk_probe(),
        };
        store.rescan_size();
        Ok(store)
    }

    /// Replace the free-space probe
    pub fn with_disk_probe(mut self, probe: DiskProbe) -> Self {
        self.disk_probe = probe;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.cache", hash_hex(key)))
    }

    /// Look up a key. Integrity or schema failures delete the entry and
    /// count as a miss; a hit bumps the entry's access time.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match entry::decode_entry::<T>(&bytes) {
            Ok((header, value)) => {
                if header.key != key || header.is_expired(Utc::now()) {
                    self.delete_entry(&path);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.touch(&path);
                Some(value)
            }
            Err(_) => {
                warn!(cache = self.name, key, "integrity failure, dropping entry");
                self.delete_entry(&path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value. Returns `Ok(false)` (and logs) when the disk-space
    /// floor refuses the write; reads continue to work either way.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        if let Some(free) = (self.disk_probe)(&self.dir) {
            if free < self.tier.disk_floor_bytes {
                warn!(
                    cache = self.name,
                    free_bytes = free,
                    floor = self.tier.disk_floor_bytes,
                    "cache volume below free-space floor, refusing write"
                );
                return Ok(false);
            }
        }

        let ttl = Duration::from_std(self.tier.max_age).unwrap_or_else(|_| Duration::days(30));
        let bytes = entry::encode_entry(key, value, ttl, self.compression_level)?;

        let lock = {
            let mut locks = self.write_locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock();

        let path = self.entry_path(key);
        let old_len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        write_atomic(&path, &bytes)?;

        self.size_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.size_bytes.fetch_sub(old_len, Ordering::Relaxed);
        debug!(cache = self.name, key, bytes = bytes.len(), "cache write");
        Ok(true)
    }

    /// Remove one entry by key
    pub fn remove(&self, key: &str) {
        self.delete_entry(&self.entry_path(key));
    }

    /// Remove entries whose logical key satisfies the predicate
    pub fn invalidate_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut dropped = 0;
        for (path, header) in self.scan_headers() {
            if predicate(&header.key) {
                self.delete_entry(&path);
                dropped += 1;
            }
        }
        dropped
    }

    /// Delete everything in the store
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "cache").unwrap_or(false) {
                let _ = fs::remove_file(&path);
            }
        }
        self.size_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Maintenance pass: drop expired entries, then entries failing their
    /// integrity stamp, then least-recently-accessed entries until the tier
    /// cap is met. Returns the number of evictions.
    pub fn maintain(&self) -> usize {
        let now = Utc::now();
        let mut evicted = 0;

        // Pass 1 and 2: expired, then integrity failures
        let mut live: Vec<(PathBuf, u64, std::time::SystemTime)> = Vec::new();
        for entry in fs::read_dir(&self.dir).into_iter().flatten().flatten() {
            let path = entry.path();
            if !path.extension().map(|e| e == "cache").unwrap_or(false) {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(_) => continue,
            };
            match entry::decode_header(&bytes) {
                Ok((header, payload_start)) => {
                    let payload = &bytes[payload_start..];
                    let stamp_ok = format!("{:016x}", crate::hashing::fnv1a_bytes(payload))
                        == header.stamp;
                    if header.is_expired(now) || !stamp_ok {
                        self.delete_entry(&path);
                        evicted += 1;
                        continue;
                    }
                }
                Err(_) => {
                    self.delete_entry(&path);
                    evicted += 1;
                    continue;
                }
            }
            let meta = entry.metadata().ok();
            let accessed = meta
                .as_ref()
                .and_then(|m| m.accessed().or_else(|_| m.modified()).ok())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let len = meta.map(|m| m.len()).unwrap_or(0);
            live.push((path, len, accessed));
        }

        // Pass 3: LRU until under the cap
        let mut total: u64 = live.iter().map(|(_, len, _)| len).sum();
        self.size_bytes.store(total, Ordering::Relaxed);
        if total > self.tier.max_bytes {
            live.sort_by_key(|(_, _, accessed)| *accessed);
            for (path, len, _) in live {
                if total <= self.tier.max_bytes {
                    break;
                }
                self.delete_entry(&path);
                total = total.saturating_sub(len);
                evicted += 1;
            }
            self.size_bytes.store(total, Ordering::Relaxed);
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(cache = self.name, evicted, "maintenance pass complete");
        }
        evicted
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let mut entries = 0u64;
        let mut uncompressed = 0u64;
        for (_, header) in self.scan_headers() {
            entries += 1;
            uncompressed += header.uncompressed_len;
        }
        self.uncompressed_bytes.store(uncompressed, Ordering::Relaxed);
        CacheStats {
            entries,
            compressed_bytes: self.size_bytes.load(Ordering::Relaxed),
            uncompressed_bytes: uncompressed,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Total on-disk bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    fn scan_headers(&self) -> Vec<(PathBuf, CacheEntryHeader)> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir).into_iter().flatten().flatten() {
            let path = entry.path();
            if !path.extension().map(|e| e == "cache").unwrap_or(false) {
                continue;
            }
            if let Ok(bytes) = fs::read(&path) {
                if let Ok((header, _)) = entry::decode_header(&bytes) {
                    out.push((path, header));
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn delete_entry(&self, path: &Path) {
        if let Ok(meta) = fs::metadata(path) {
            self.size_bytes.fetch_sub(meta.len(), Ordering::Relaxed);
        }
        let _ = fs::remove_file(path);
    }

    fn touch(&self, path: &Path) {
        // Reading already refreshes atime where the platform tracks it; an
        // explicit open keeps LRU ordering meaningful on relatime mounts.
        let _ = fs::OpenOptions::new().read(true).open(path);
    }

    fn rescan_size(&self) {
        let total: u64 = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();
        self.size_bytes.store(total, Ordering::Relaxed);
    }
}
