//! Multi-tier persistent cache
//!
//! Three cooperating stores under one per-solution partition:
//! `compilations/` (per-file compilation metadata), `call-graph/` (adjacency
//! fragments keyed by project content hash), and `projects/` (project
//! metadata). All three share the same entry mechanism: gzip + framed header
//! + integrity stamp, written atomically, evicted by age, integrity, and LRU
//! under a tier-derived size cap.

pub mod entry;
pub mod invalidation;
pub mod store;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::graph::model::SerializableGraph;
use crate::project::{ProjectInfo, COMPILER_VERSION_TAG};
use crate::solution::Solution;
use crate::symbols::id::MethodId;

pub use store::{CacheStats, CacheStore, CacheTier, DiskProbe};

/// Atomically replace `path` with `bytes`: write a `.tmp` sibling, then
/// rename it over the target. Windows cannot rename over an existing file,
/// so the target is removed first there. Every on-disk cache artifact goes
/// through this so a crash never leaves a torn file under its final name.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    #[cfg(windows)]
    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::rename(&tmp, path)
}

/// Default per-user cache base: the platform cache directory plus `testmap`
/// (`~/.cache/testmap` on Linux), or the temp directory when no per-user
/// cache location exists.
fn default_cache_base() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("testmap"))
        .unwrap_or_else(|| std::env::temp_dir().join("testmap"))
}

/// Payload of the compilation metadata cache. The compilation object itself
/// is never persisted; this is the cheap summary used to answer
/// `analyze-solution` without recompiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationMeta {
    pub assembly_name: String,
    pub syntax_tree_count: usize,
    pub summary: String,
}

/// Payload of the call-graph cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCallGraph {
    pub graph: SerializableGraph,
    pub test_methods: Vec<MethodId>,
    pub build_ms: u64,
    pub built_at: DateTime<Utc>,
}

/// Summary returned by `cache status`
#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub root: PathBuf,
    pub initialized: bool,
    pub total_entries: u64,
    pub total_compressed_bytes: u64,
    pub tier_cap_bytes: u64,
}

/// The three stores of one solution's cache partition
pub struct CacheManager {
    root: PathBuf,
    tier: CacheTier,
    pub compilations: CacheStore,
    pub call_graphs: CacheStore,
    pub projects: CacheStore,
}

impl CacheManager {
    /// Open the partition for a solution, creating directories as needed.
    ///
    /// `dir_override` replaces the default per-user cache base.
    pub fn open(solution: &Solution, dir_override: Option<&Path>) -> Result<Self> {
        let base = dir_override
            .map(Path::to_path_buf)
            .unwrap_or_else(default_cache_base);
        let root = base.join(solution.partition_hash());
        let tier = CacheTier::for_project_count(solution.projects.len());

        let compilations =
            CacheStore::open("compilations", root.join("compilations"), tier)?;
        let call_graphs = CacheStore::open("call-graph", root.join("call-graph"), tier)?;
        let projects = CacheStore::open("projects", root.join("projects"), tier)?;
        fs::create_dir_all(root.join("snapshots"))?;

        Ok(Self {
            root,
            tier,
            compilations,
            call_graphs,
            projects,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join("snapshots").join("current.json")
    }

    // ========== Key builders ==========

    /// Compilation metadata key: source path + mtime + size + compiler version
    pub fn compilation_key(path: &Path) -> String {
        let (mtime, size) = fs::metadata(path)
            .map(|m| {
                let mtime = m
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                (mtime, m.len())
            })
            .unwrap_or((0, 0));
        format!(
            "compilation|{}|{}|{}|{}",
            path.display(),
            mtime,
            size,
            COMPILER_VERSION_TAG
        )
    }

    /// Call-graph key: project name + content hash (which already folds in
    /// sorted dependency hashes and the compiler version tag)
    pub fn call_graph_key(project: &ProjectInfo) -> String {
        format!(
            "callgraph|{}|{}|{}",
            project.name, project.content_hash, COMPILER_VERSION_TAG
        )
    }

    /// Solution-wide graph key derived from every project hash
    pub fn solution_graph_key(solution: &Solution) -> String {
        let mut hashes: Vec<&str> = solution
            .projects
            .iter()
            .map(|p| p.content_hash.as_str())
            .collect();
        hashes.sort();
        format!(
            "callgraph|solution|{}|{}",
            hashes.join(","),
            COMPILER_VERSION_TAG
        )
    }

    /// Project metadata key: project path + target framework
    pub fn project_key(path: &Path, target_framework: &str) -> String {
        format!("project|{}|{}", path.display(), target_framework)
    }

    // ========== Partition-wide operations ==========

    pub fn stores(&self) -> [&CacheStore; 3] {
        [&self.compilations, &self.call_graphs, &self.projects]
    }

    /// Run the eviction pass on every store
    pub fn maintain(&self) -> usize {
        self.stores().iter().map(|s| s.maintain()).sum()
    }

    /// Per-store statistics
    pub fn stats(&self) -> BTreeMap<&'static str, CacheStats> {
        let mut out = BTreeMap::new();
        out.insert("compilations", self.compilations.stats());
        out.insert("call-graph", self.call_graphs.stats());
        out.insert("projects", self.projects.stats());
        out
    }

    pub fn status(&self) -> CacheStatus {
        let stats = self.stats();
        CacheStatus {
            root: self.root.clone(),
            initialized: self.root.exists(),
            total_entries: stats.values().map(|s| s.entries).sum(),
            total_compressed_bytes: stats.values().map(|s| s.compressed_bytes).sum(),
            tier_cap_bytes: self.tier.max_bytes,
        }
    }

    pub fn clear(&self) -> Result<()> {
        for store in self.stores() {
            store.clear()?;
        }
        let _ = fs::remove_file(self.snapshot_path());
        info!(root = %self.root.display(), "cache cleared");
        Ok(())
    }

    /// Total on-disk bytes across the partition
    pub fn total_size_bytes(&self) -> u64 {
        self.stores().iter().map(|s| s.size_bytes()).sum()
    }

    /// Drop every entry belonging to the named projects or mentioning the
    /// changed files. Used by snapshot invalidation and the watcher.
    pub fn invalidate(&self, projects: &[String], files: &[PathBuf]) -> usize {
        let mut dropped = 0;
        dropped += self.call_graphs.invalidate_where(|key| {
            projects.iter().any(|p| key.contains(&format!("|{}|", p)))
                // The solution-wide graph folds every project hash
                || (!projects.is_empty() && key.contains("|solution|"))
        });
        dropped += self.compilations.invalidate_where(|key| {
            files
                .iter()
                .any(|f| key.contains(&f.display().to_string()))
        });
        dropped += self.projects.invalidate_where(|key| {
            projects.iter().any(|p| key.contains(p))
                || files.iter().any(|f| key.contains(&f.display().to_string()))
        });
        if dropped > 0 {
            info!(dropped, "cache entries invalidated");
        }
        dropped
    }
}
