//! Workspace manager
//!
//! Owns the solution, the symbol index, and every live compilation. Projects
//! load lazily: a query touching a handful of files only compiles the
//! projects those files belong to, plus their transitive dependencies in
//! topological order. Compilation creation is serialized per project with a
//! per-project mutex; reads of completed compilations are lock-free clones
//! of an `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::compilation::{Compilation, SemanticModel};
use crate::error::{EngineError, Result, Warning, WarningCategory};
use crate::hashing::fnv1a_hash;
use crate::project::ProjectInfo;
use crate::solution::Solution;
use crate::symbols::index::SymbolIndex;

/// Default per-project analysis timeout
pub const DEFAULT_PROJECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolves external assembly references against configurable search roots.
///
/// Hosts with different runtime layouts supply their own implementation; the
/// engine itself only needs the resolved paths for deduplication.
pub trait MetadataResolver: Send + Sync {
    /// Resolve an assembly simple name to a file path, if present under any
    /// search root
    fn resolve(&self, assembly_name: &str) -> Option<PathBuf>;
}

/// Directory-probing resolver with a content-hash pool so identical
/// assemblies referenced by many projects resolve to one shared entry.
pub struct DirectoryMetadataResolver {
    roots: Vec<PathBuf>,
    pool: Mutex<AHashMap<u64, PathBuf>>,
}

impl DirectoryMetadataResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            pool: Mutex::new(AHashMap::new()),
        }
    }
}

impl MetadataResolver for DirectoryMetadataResolver {
    fn resolve(&self, assembly_name: &str) -> Option<PathBuf> {
        let key = fnv1a_hash(assembly_name);
        if let Some(path) = self.pool.lock().get(&key) {
            return Some(path.clone());
        }
        for root in &self.roots {
            let candidate = root.join(format!("{}.dll", assembly_name));
            if candidate.exists() {
                self.pool.lock().insert(key, candidate.clone());
                return Some(candidate);
            }
        }
        None
    }
}

/// The aggregate of all projects and their compilations for one solution
pub struct Workspace {
    solution: Solution,
    index: SymbolIndex,
    compilations: RwLock<AHashMap<String, Arc<Compilation>>>,
    /// Per-project creation locks (single-writer per project)
    build_locks: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
    /// Projects whose compilation failed or timed out
    degraded: Mutex<AHashSet<String>>,
    warnings: Mutex<Vec<Warning>>,
    project_timeout: Duration,
    #[allow(dead_code)]
    metadata_resolver: Arc<dyn MetadataResolver>,
}

impl Workspace {
    /// Parse the solution manifest and build the symbol index.
    ///
    /// No project is compiled here; compilations happen on first touch.
    pub fn initialize(solution_path: &Path) -> Result<Self> {
        let solution = Solution::load(solution_path)?;
        let index = SymbolIndex::build(&solution);
        let roots = vec![solution
            .path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()];
        Ok(Self {
            solution,
            index,
            compilations: RwLock::new(AHashMap::new()),
            build_locks: Mutex::new(AHashMap::new()),
            degraded: Mutex::new(AHashSet::new()),
            warnings: Mutex::new(Vec::new()),
            project_timeout: DEFAULT_PROJECT_TIMEOUT,
            metadata_resolver: Arc::new(DirectoryMetadataResolver::new(roots)),
        })
    }

    /// Override the per-project timeout
    pub fn with_project_timeout(mut self, timeout: Duration) -> Self {
        self.project_timeout = timeout;
        self
    }

    /// Replace the metadata resolver
    pub fn with_metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.metadata_resolver = resolver;
        self
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn symbol_index(&self) -> &SymbolIndex {
        &self.index
    }

    /// Warnings accumulated by degraded compilations
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings.lock())
    }

    /// Projects marked degraded (failed or timed out)
    pub fn degraded_projects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.degraded.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// The project that declares a file; O(1) after the index is built
    pub fn project_for_file(&self, path: &Path) -> Result<&ProjectInfo> {
        // The index is keyed by canonical source paths; fall back to
        // canonicalizing when the caller hands in a relative or aliased path
        let name = self
            .index
            .project_for_file(path)
            .or_else(|| {
                path.canonicalize()
                    .ok()
                    .and_then(|canonical| self.index.project_for_file(&canonical))
            })
            .ok_or_else(|| EngineError::FileNotInSolution {
                path: path.display().to_string(),
            })?;
        self.solution
            .project(name)
            .ok_or_else(|| EngineError::FileNotInSolution {
                path: path.display().to_string(),
            })
    }

    /// A cached compilation, if the project has already been built
    pub fn cached_compilation(&self, project: &str) -> Option<Arc<Compilation>> {
        self.compilations.read().get(project).cloned()
    }

    /// Get or build the compilation for a project.
    ///
    /// Building triggers compilation of the project's transitive
    /// dependencies first, in topological order. A dependency that fails
    /// degrades to a warning; only a failure of the requested project itself
    /// is an error.
    pub fn compilation(&self, project: &str, cancel: &CancelToken) -> Result<Arc<Compilation>> {
        for dep in self.solution.transitive_dependencies(project) {
            cancel.check()?;
            if let Err(e) = self.build_one(dep, cancel) {
                if matches!(e, EngineError::Canceled) {
                    return Err(e);
                }
                // Missing optional references degrade; the depending project
                // still compiles against what is available.
                self.note_degraded(dep, &e);
            }
        }
        cancel.check()?;
        self.build_one(project, cancel).map_err(|e| {
            self.note_degraded(project, &e);
            e
        })
    }

    /// Semantic model for a file: its parse tree plus the declaration tables
    /// of its project and dependencies.
    pub fn with_semantic_model<R>(
        &self,
        path: &Path,
        cancel: &CancelToken,
        f: impl FnOnce(&SemanticModel<'_>) -> R,
    ) -> Result<R> {
        let project = self.project_for_file(path)?.name.clone();
        let compilation = self.compilation(&project, cancel)?;
        let deps = self.dependency_compilations(&project);

        let file_idx =
            compilation
                .file_index(path)
                .ok_or_else(|| EngineError::FileNotInSolution {
                    path: path.display().to_string(),
                })?;
        let model = SemanticModel {
            file: &compilation.files[file_idx],
            decls: &compilation.decls[file_idx],
            compilation: &compilation,
            dependencies: deps.iter().map(Arc::as_ref).collect(),
        };
        Ok(f(&model))
    }

    /// Already-built compilations of a project's transitive dependencies,
    /// dependency-first
    pub fn dependency_compilations(&self, project: &str) -> Vec<Arc<Compilation>> {
        let map = self.compilations.read();
        self.solution
            .transitive_dependencies(project)
            .into_iter()
            .filter_map(|name| map.get(name).cloned())
            .collect()
    }

    /// Release all compilations
    pub fn dispose(&self) {
        self.compilations.write().clear();
    }

    fn build_one(&self, project: &str, cancel: &CancelToken) -> Result<Arc<Compilation>> {
        if let Some(existing) = self.cached_compilation(project) {
            return Ok(existing);
        }

        let lock = {
            let mut locks = self.build_locks.lock();
            locks
                .entry(project.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock();

        // Double-checked: another thread may have built it while we waited
        if let Some(existing) = self.cached_compilation(project) {
            return Ok(existing);
        }
        cancel.check()?;

        let info = self
            .solution
            .project(project)
            .ok_or_else(|| EngineError::Compilation {
                project: project.to_string(),
                message: "project not found in solution".to_string(),
            })?;

        let started = Instant::now();
        let compilation = Arc::new(Compilation::build(info)?);
        let elapsed = started.elapsed();
        if elapsed > self.project_timeout {
            return Err(EngineError::Timeout {
                project: project.to_string(),
                seconds: elapsed.as_secs(),
            });
        }

        debug!(project, elapsed_ms = elapsed.as_millis() as u64, "project compiled");
        self.compilations
            .write()
            .insert(project.to_string(), compilation.clone());
        Ok(compilation)
    }

    fn note_degraded(&self, project: &str, error: &EngineError) {
        let mut degraded = self.degraded.lock();
        if degraded.insert(project.to_string()) {
            warn!(project, %error, "project degraded");
            let category = match error {
                EngineError::Timeout { .. } => WarningCategory::Timeout,
                _ => WarningCategory::Compilation,
            };
            self.warnings
                .lock()
                .push(Warning::new(category, error.to_string()));
        }
    }
}
