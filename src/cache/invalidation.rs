//! Invalidation and change detection
//!
//! Keeps a compact per-solution snapshot of source and project file
//! fingerprints (path, size, mtime, content hash) and computes what changed
//! since the previous analysis. Detection is linear in the number of files
//! and never parses source. A filesystem watcher, when running, feeds the
//! same invalidation path between snapshots.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{write_atomic, CacheManager};
use crate::error::Result;
use crate::hashing::fnv1a_bytes;
use crate::solution::Solution;

/// Fingerprint of one file at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    pub mtime: u64,
    /// FNV-1a over the file contents, hex
    pub content_hash: String,
}

/// Recorded state of every solution file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: String,
    /// Absolute path -> fingerprint, sorted for stable serialization
    pub files: BTreeMap<PathBuf, FileFingerprint>,
}

/// Classified differences between two snapshots
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Every path in the report, for cache-key intersection
    pub fn all_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        out.extend(self.added.iter().cloned());
        out.extend(self.modified.iter().cloned());
        out.extend(self.deleted.iter().cloned());
        out
    }
}

impl Snapshot {
    /// Fingerprint every source and project file of a solution
    pub fn take(solution: &Solution) -> Self {
        let mut files = BTreeMap::new();
        for project in &solution.projects {
            fingerprint_into(&project.path, &mut files);
            for source in &project.sources {
                fingerprint_into(source, &mut files);
            }
        }
        Self {
            taken_at: chrono::Utc::now().to_rfc3339(),
            files,
        }
    }

    pub fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| {
            crate::error::EngineError::Internal {
                message: format!("snapshot serialization failed: {}", e),
            }
        })?;
        write_atomic(path, &json)?;
        Ok(())
    }

    /// Classify changes relative to this (older) snapshot
    pub fn compute_changes(&self, current: &Snapshot) -> ChangeReport {
        let mut report = ChangeReport::default();
        for (path, fingerprint) in &current.files {
            match self.files.get(path) {
                None => report.added.push(path.clone()),
                Some(old) if old.content_hash != fingerprint.content_hash => {
                    report.modified.push(path.clone())
                }
                Some(_) => {}
            }
        }
        for path in self.files.keys() {
            if !current.files.contains_key(path) {
                report.deleted.push(path.clone());
            }
        }
        report
    }
}

fn fingerprint_into(path: &Path, files: &mut BTreeMap<PathBuf, FileFingerprint>) {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return,
    };
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let content_hash = fs::read(path)
        .map(|bytes| format!("{:016x}", fnv1a_bytes(&bytes)))
        .unwrap_or_default();
    files.insert(
        path.to_path_buf(),
        FileFingerprint {
            size: meta.len(),
            mtime,
            content_hash,
        },
    );
}

/// Startup invalidation: compare the stored snapshot against the live tree,
/// drop affected cache entries, and persist the fresh snapshot.
pub fn reconcile(solution: &Solution, cache: &CacheManager) -> Result<ChangeReport> {
    let current = Snapshot::take(solution);
    let previous = Snapshot::load(&cache.snapshot_path()).unwrap_or_default();
    let report = previous.compute_changes(&current);

    if !report.is_empty() {
        let changed = report.all_paths();
        let affected_projects: Vec<String> = solution
            .projects
            .iter()
            .filter(|p| {
                changed
                    .iter()
                    .any(|c| c == &p.path || p.sources.contains(c))
            })
            .map(|p| p.name.clone())
            .collect();
        debug!(
            added = report.added.len(),
            modified = report.modified.len(),
            deleted = report.deleted.len(),
            projects = affected_projects.len(),
            "snapshot drift detected"
        );
        cache.invalidate(&affected_projects, &changed);
    }

    current.save(&cache.snapshot_path())?;
    Ok(report)
}

/// Filesystem watcher feeding cache invalidation between snapshots.
///
/// Events are debounced; `drain` hands back the batch of changed paths and
/// the caller runs them through `CacheManager::invalidate`.
pub struct ChangeWatcher {
    root: PathBuf,
    debounce: Duration,
    running: Arc<AtomicBool>,
    pending: Arc<Mutex<Vec<PathBuf>>>,
}

/// Keeps the watcher thread alive; dropping it stops watching
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ChangeWatcher {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            debounce: Duration::from_millis(100),
            running: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching the solution tree recursively
    pub fn start(&self) -> Result<WatcherHandle> {
        let pending = Arc::clone(&self.pending);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let running_for_events = Arc::clone(&self.running);
        let mut debouncer = new_debouncer(self.debounce, move |events: DebounceEventResult| {
            if !running_for_events.load(Ordering::SeqCst) {
                return;
            }
            match events {
                Ok(events) => {
                    let mut pending = pending.lock();
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let relevant = event
                            .path
                            .extension()
                            .map(|ext| ext == "cs" || ext == "csproj" || ext == "sln")
                            .unwrap_or(false);
                        if relevant && !pending.contains(&event.path) {
                            pending.push(event.path);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watcher error"),
            }
        })
        .map_err(|e| crate::error::EngineError::Internal {
            message: format!("failed to start watcher: {}", e),
        })?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| crate::error::EngineError::Internal {
                message: format!("failed to watch {}: {}", self.root.display(), e),
            })?;

        Ok(WatcherHandle {
            running,
            _debouncer: debouncer,
        })
    }

    /// Take the batch of changed paths observed since the last drain
    pub fn drain(&self) -> Vec<PathBuf> {
        std::mem::take(&mut self.pending.lock())
    }
}
