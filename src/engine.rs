//! Engine façade
//!
//! `ImpactEngine` is the process-wide handle the CLI and any host service
//! consume. All entry points are async; expensive operations (workspace
//! load, full graph build, coverage map) serialize on a global fair
//! semaphore while per-file parallelism inside an operation stays unbounded.
//! Every operation accepts a `CancelToken` checked at suspension points.
//!
//! Built graphs, workspaces, and test catalogs are memoized in memory per
//! solution; derived artifacts persist through the cache layer with
//! snapshot-based invalidation on open.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::cache::invalidation;
use crate::cache::{CacheManager, CacheStats, CachedCallGraph, CompilationMeta};
use crate::cancel::CancelToken;
use crate::config::EngineOptions;
use crate::coverage::analyzer::{
    self, CoverageMap, CoverageOptions, CoverageResult, TestCatalog,
};
use crate::error::{EngineError, Result, Warning};
use crate::graph::builder::{self, BuildStats, GraphOptions};
use crate::graph::model::{MethodCallGraph, SerializableGraph};
use crate::impact::{
    self, ChangeSet, ConfidenceLevel, ImpactResult, SelectionConstraints, TestSelection,
};
use crate::symbols::id::MethodId;
use crate::workspace::Workspace;
use crate::error::AnalysisStatus;

/// Per-solution state retained by the engine
struct SolutionState {
    workspace: Arc<Workspace>,
    cache: Arc<CacheManager>,
    graph: Mutex<Option<Arc<MethodCallGraph>>>,
    catalog: Mutex<Option<Arc<TestCatalog>>>,
}

/// Summary returned by `analyze-solution`
#[derive(Debug, Serialize)]
pub struct SolutionAnalysis {
    pub solution: String,
    pub projects: usize,
    pub test_projects: usize,
    pub source_files: usize,
    pub test_methods: usize,
    pub status: AnalysisStatus,
    pub warnings: Vec<Warning>,
}

/// Graph build result carried across the API boundary
#[derive(Debug, Serialize)]
pub struct GraphAnalysis {
    pub graph: SerializableGraph,
    pub stats: BuildStats,
    pub from_cache: bool,
    pub status: AnalysisStatus,
    pub warnings: Vec<Warning>,
}

/// One node of an execution trace
#[derive(Debug, Serialize)]
pub struct TraceNode {
    pub method: MethodId,
    pub depth: usize,
}

/// Ordered call tree from a test method
#[derive(Debug, Serialize)]
pub struct ExecutionTrace {
    pub root: MethodId,
    pub nodes: Vec<TraceNode>,
    pub truncated: bool,
}

/// The top-level engine handle, created at startup and shared per process
pub struct ImpactEngine {
    options: EngineOptions,
    gate: Arc<Semaphore>,
    solutions: Mutex<AHashMap<PathBuf, Arc<SolutionState>>>,
}

impl ImpactEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            gate: Arc::new(Semaphore::new(1)),
            solutions: Mutex::new(AHashMap::new()),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Parse a solution and summarize its projects and tests
    pub async fn analyze_solution(
        &self,
        solution_path: &Path,
        cancel: CancelToken,
    ) -> Result<SolutionAnalysis> {
        let state = self.state_for(solution_path, &cancel).await?;
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            cancel.check()?;
            let solution = state.workspace.solution();
            let catalog = load_catalog(&state, &cancel)?;
            let warnings = state.workspace.take_warnings();
            // Per-file compilation metadata entries make repeat summaries
            // cheap; the compilation objects themselves are never stored.
            for project in &solution.projects {
                for source in &project.sources {
                    let key = CacheManager::compilation_key(source);
                    if state
                        .cache
                        .compilations
                        .get::<CompilationMeta>(&key)
                        .is_none()
                    {
                        let meta = CompilationMeta {
                            assembly_name: project.name.clone(),
                            syntax_tree_count: project.sources.len(),
                            summary: format!(
                                "{} ({})",
                                project.name, project.target_framework
                            ),
                        };
                        let _ = state.cache.compilations.put(&key, &meta);
                    }
                }
            }
            Ok(SolutionAnalysis {
                solution: solution.name.clone(),
                projects: solution.projects.len(),
                test_projects: solution
                    .projects
                    .iter()
                    .filter(|p| p.is_test_project)
                    .count(),
                source_files: solution.projects.iter().map(|p| p.sources.len()).sum(),
                test_methods: catalog.len(),
                status: if warnings.is_empty() {
                    AnalysisStatus::Complete
                } else {
                    AnalysisStatus::Partial
                },
                warnings,
            })
        })
        .await
        .map_err(join_error)?
    }

    /// Build (or load from cache) the full call graph
    pub async fn build_call_graph(
        &self,
        solution_path: &Path,
        cancel: CancelToken,
    ) -> Result<GraphAnalysis> {
        let state = self.state_for(solution_path, &cancel).await?;
        let options = self.options.clone();
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let (graph, stats, from_cache, warnings) =
                load_graph(&state, &options, &cancel)?;
            Ok(GraphAnalysis {
                graph: graph.to_serializable(),
                stats,
                from_cache,
                status: if warnings.is_empty() {
                    AnalysisStatus::Complete
                } else {
                    AnalysisStatus::Partial
                },
                warnings,
            })
        })
        .await
        .map_err(join_error)?
    }

    /// Find the tests covering one production method
    pub async fn find_tests_for_method(
        &self,
        solution_path: &Path,
        method: &str,
        cancel: CancelToken,
    ) -> Result<CoverageResult> {
        let target = MethodId::parse(method).ok_or_else(|| EngineError::UnresolvedMethod {
            id: method.to_string(),
        })?;
        let state = self.state_for(solution_path, &cancel).await?;
        let options = self.options.clone();
        let coverage_options = self.coverage_options();
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let (graph, _, _, _) = load_graph(&state, &options, &cancel)?;
            let catalog = load_catalog(&state, &cancel)?;
            Ok(analyzer::find_tests_for_method(
                &graph,
                &catalog,
                &target,
                &coverage_options,
            ))
        })
        .await
        .map_err(join_error)?
    }

    /// Bulk production-method -> tests index
    pub async fn build_coverage_map(
        &self,
        solution_path: &Path,
        cancel: CancelToken,
    ) -> Result<CoverageMap> {
        let state = self.state_for(solution_path, &cancel).await?;
        let options = self.options.clone();
        let coverage_options = self.coverage_options();
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let (graph, _, _, _) = load_graph(&state, &options, &cancel)?;
            let catalog = load_catalog(&state, &cancel)?;
            Ok(analyzer::build_coverage_map(
                &graph,
                &catalog,
                &coverage_options,
            ))
        })
        .await
        .map_err(join_error)?
    }

    /// Impact analysis over a change set
    pub async fn analyze_diff(
        &self,
        solution_path: &Path,
        change_set: ChangeSet,
        cancel: CancelToken,
    ) -> Result<ImpactResult> {
        let state = self.state_for(solution_path, &cancel).await?;
        let options = self.options.clone();
        let max_depth = self.options.max_depth;
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let (graph, _, _, _) = load_graph(&state, &options, &cancel)?;
            let catalog = load_catalog(&state, &cancel)?;
            Ok(impact::analyze_changes(
                &graph,
                &catalog,
                &change_set,
                max_depth,
            ))
        })
        .await
        .map_err(join_error)?
    }

    /// Impact analysis plus selection at a confidence level
    pub async fn select_tests(
        &self,
        solution_path: &Path,
        change_set: ChangeSet,
        level: Option<ConfidenceLevel>,
        constraints: SelectionConstraints,
        cancel: CancelToken,
    ) -> Result<TestSelection> {
        let level = level.unwrap_or(self.options.confidence_level);
        let impact = self.analyze_diff(solution_path, change_set, cancel).await?;
        Ok(impact::select_tests(&impact, level, &constraints))
    }

    /// Ordered call tree from a test method, depth-first in call order
    pub async fn trace_execution(
        &self,
        solution_path: &Path,
        test_method: &str,
        max_depth: usize,
        cancel: CancelToken,
    ) -> Result<ExecutionTrace> {
        let root = MethodId::parse(test_method).ok_or_else(|| EngineError::UnresolvedMethod {
            id: test_method.to_string(),
        })?;
        let state = self.state_for(solution_path, &cancel).await?;
        let options = self.options.clone();
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let (graph, _, _, _) = load_graph(&state, &options, &cancel)?;
            Ok(trace_tree(&graph, &root, max_depth))
        })
        .await
        .map_err(join_error)?
    }

    // ========== Cache management ==========

    /// Create the cache partition and record the baseline snapshot
    pub async fn cache_init(&self, solution_path: &Path, cancel: CancelToken) -> Result<PathBuf> {
        let state = self.state_for(solution_path, &cancel).await?;
        Ok(state.cache.root().to_path_buf())
    }

    /// Build and persist the expensive artifacts ahead of queries
    pub async fn cache_warm_up(&self, solution_path: &Path, cancel: CancelToken) -> Result<()> {
        self.build_call_graph(solution_path, cancel.clone()).await?;
        let state = self.state_for(solution_path, &cancel).await?;
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            load_catalog(&state, &cancel)?;
            state.cache.maintain();
            Ok(())
        })
        .await
        .map_err(join_error)?
    }

    pub async fn cache_status(
        &self,
        solution_path: &Path,
        cancel: CancelToken,
    ) -> Result<crate::cache::CacheStatus> {
        let state = self.state_for(solution_path, &cancel).await?;
        Ok(state.cache.status())
    }

    pub async fn cache_stats(
        &self,
        solution_path: &Path,
        cancel: CancelToken,
    ) -> Result<std::collections::BTreeMap<&'static str, CacheStats>> {
        let state = self.state_for(solution_path, &cancel).await?;
        Ok(state.cache.stats())
    }

    pub async fn cache_clear(&self, solution_path: &Path, cancel: CancelToken) -> Result<()> {
        let state = self.state_for(solution_path, &cancel).await?;
        state.graph.lock().take();
        state.catalog.lock().take();
        state.cache.clear()
    }

    // ========== Internals ==========

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit> {
        self.gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Canceled)
    }

    /// Load (or reuse) the workspace and cache partition for a solution
    async fn state_for(
        &self,
        solution_path: &Path,
        cancel: &CancelToken,
    ) -> Result<Arc<SolutionState>> {
        let key = solution_path.to_path_buf();
        if let Some(state) = self.solutions.lock().get(&key) {
            return Ok(state.clone());
        }

        let cancel = cancel.clone();
        let timeout = Duration::from_secs(self.options.timeout_seconds);
        let cache_dir = self.options.cache_dir.clone();
        let path = key.clone();
        let state = tokio::task::spawn_blocking(move || -> Result<Arc<SolutionState>> {
            cancel.check()?;
            let workspace =
                Workspace::initialize(&path).map(|w| w.with_project_timeout(timeout))?;
            let cache = CacheManager::open(workspace.solution(), cache_dir.as_deref())?;
            // Snapshot drift drops stale entries before any read
            let report = invalidation::reconcile(workspace.solution(), &cache)?;
            // Write-through project metadata so reopened sessions and the
            // stats surface see the discovered projects
            for project in &workspace.solution().projects {
                let key = CacheManager::project_key(&project.path, &project.target_framework);
                if cache.projects.get::<crate::project::ProjectInfo>(&key).is_none() {
                    let _ = cache.projects.put(&key, project);
                }
            }
            if !report.is_empty() {
                debug!(
                    added = report.added.len(),
                    modified = report.modified.len(),
                    deleted = report.deleted.len(),
                    "solution changed since last analysis"
                );
            }
            Ok(Arc::new(SolutionState {
                workspace: Arc::new(workspace),
                cache: Arc::new(cache),
                graph: Mutex::new(None),
                catalog: Mutex::new(None),
            }))
        })
        .await
        .map_err(join_error)??;

        self.solutions.lock().insert(key, state.clone());
        Ok(state)
    }

    fn coverage_options(&self) -> CoverageOptions {
        CoverageOptions {
            max_depth: self.options.max_depth,
            ..Default::default()
        }
    }
}

/// Build or load the graph for a solution, consulting the disk cache.
///
/// The project filter resolves against this solution; a filtered build gets
/// its own cache key so a solution-wide graph is never shadowed.
fn load_graph(
    state: &SolutionState,
    engine_options: &EngineOptions,
    cancel: &CancelToken,
) -> Result<(Arc<MethodCallGraph>, BuildStats, bool, Vec<Warning>)> {
    if let Some(graph) = state.graph.lock().clone() {
        return Ok((graph, BuildStats::default(), true, Vec::new()));
    }

    let solution = state.workspace.solution();
    let selected: Vec<String> = engine_options
        .projects
        .select(&solution.projects)?
        .iter()
        .map(|p| p.name.clone())
        .collect();
    let solutionwide = selected.len() == solution.projects.len();
    let options = GraphOptions {
        projects: if solutionwide { Vec::new() } else { selected.clone() },
        inclusive_dispatch: engine_options.inclusive_dispatch,
    };

    let mut key = CacheManager::solution_graph_key(solution);
    if !solutionwide {
        key.push_str("|filter:");
        key.push_str(&crate::hashing::hash_hex(&selected.join(",")));
    }
    if engine_options.inclusive_dispatch {
        key.push_str("|inclusive");
    }
    if let Some(cached) = state.cache.call_graphs.get::<CachedCallGraph>(&key) {
        info!("call graph loaded from cache");
        let mut graph = MethodCallGraph::from_serializable(cached.graph);
        for test in &cached.test_methods {
            graph.mark_test(test);
        }
        let graph = Arc::new(graph);
        *state.graph.lock() = Some(graph.clone());
        return Ok((graph, BuildStats::default(), true, Vec::new()));
    }

    cancel.check()?;
    let outcome = builder::build_full(&state.workspace, &options, cancel)?;
    let catalog = load_catalog(state, cancel)?;
    let mut graph = outcome.graph;
    catalog.mark_graph(&mut graph);

    let cached = CachedCallGraph {
        graph: graph.to_serializable(),
        test_methods: catalog.ids().into_iter().cloned().collect(),
        build_ms: outcome.stats.build_ms,
        built_at: chrono::Utc::now(),
    };
    if let Err(e) = state.cache.call_graphs.put(&key, &cached) {
        // A failed cache write degrades persistence, never the result
        tracing::warn!(error = %e, "failed to persist call graph");
    }

    let graph = Arc::new(graph);
    *state.graph.lock() = Some(graph.clone());
    Ok((graph, outcome.stats, false, outcome.warnings))
}

/// Identify (or reuse) the solution's test catalog
fn load_catalog(state: &SolutionState, cancel: &CancelToken) -> Result<Arc<TestCatalog>> {
    if let Some(catalog) = state.catalog.lock().clone() {
        return Ok(catalog);
    }
    let catalog = Arc::new(TestCatalog::identify(&state.workspace, cancel)?);
    *state.catalog.lock() = Some(catalog.clone());
    Ok(catalog)
}

/// Depth-first call tree in call order, cycle-safe
fn trace_tree(graph: &MethodCallGraph, root: &MethodId, max_depth: usize) -> ExecutionTrace {
    let mut nodes = Vec::new();
    let mut truncated = false;
    let mut on_path: Vec<MethodId> = Vec::new();

    fn walk(
        graph: &MethodCallGraph,
        current: &MethodId,
        depth: usize,
        max_depth: usize,
        on_path: &mut Vec<MethodId>,
        nodes: &mut Vec<TraceNode>,
        truncated: &mut bool,
    ) {
        nodes.push(TraceNode {
            method: current.clone(),
            depth,
        });
        if depth >= max_depth {
            if !graph.callees(current).is_empty() {
                *truncated = true;
            }
            return;
        }
        on_path.push(current.clone());
        for callee in graph.callees(current) {
            if on_path.contains(callee) {
                continue;
            }
            walk(graph, callee, depth + 1, max_depth, on_path, nodes, truncated);
        }
        on_path.pop();
    }

    walk(
        graph,
        root,
        0,
        max_depth,
        &mut on_path,
        &mut nodes,
        &mut truncated,
    );
    ExecutionTrace {
        root: root.clone(),
        nodes,
        truncated,
    }
}

fn join_error(e: tokio::task::JoinError) -> EngineError {
    EngineError::Internal {
        message: format!("worker task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(dir: &Path) -> PathBuf {
        let app = dir.join("App");
        let tests = dir.join("App.Tests");
        fs::create_dir_all(&app).unwrap();
        fs::create_dir_all(&tests).unwrap();
        fs::write(app.join("App.csproj"), "<Project></Project>").unwrap();
        fs::write(
            app.join("Calc.cs"),
            r#"
namespace App
{
    public class Calc
    {
        public int Add(int a, int b) { return a + b; }
    }
}
"#,
        )
        .unwrap();
        fs::write(
            tests.join("App.Tests.csproj"),
            "<Project><ItemGroup><PackageReference Include=\"xunit\" Version=\"2.6\" /><ProjectReference Include=\"..\\App\\App.csproj\" /></ItemGroup></Project>",
        )
        .unwrap();
        fs::write(
            tests.join("CalcTests.cs"),
            r#"
using App;

namespace App.Tests
{
    public class CalcTests
    {
        [Fact]
        public void Add_TwoPositives_ReturnsSum()
        {
            var calc = new Calc();
            calc.Add(2, 3);
        }
    }
}
"#,
        )
        .unwrap();
        let sln = dir.join("App.sln");
        fs::write(
            &sln,
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App\\App.csproj\", \"{1}\"\nEndProject\n\
             Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App.Tests\", \"App.Tests\\App.Tests.csproj\", \"{2}\"\nEndProject\n",
        )
        .unwrap();
        sln
    }

    fn engine_for(dir: &Path) -> ImpactEngine {
        ImpactEngine::new(EngineOptions {
            cache_dir: Some(dir.join(".testmap-cache")),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_analyze_solution_summary() {
        let temp = tempfile::tempdir().unwrap();
        let sln = fixture(temp.path());
        let engine = engine_for(temp.path());

        let analysis = engine
            .analyze_solution(&sln, CancelToken::new())
            .await
            .unwrap();
        assert_eq!(analysis.projects, 2);
        assert_eq!(analysis.test_projects, 1);
        assert_eq!(analysis.test_methods, 1);
    }

    #[tokio::test]
    async fn test_find_tests_for_method_end_to_end() {
        let temp = tempfile::tempdir().unwrap();
        let sln = fixture(temp.path());
        let engine = engine_for(temp.path());

        let result = engine
            .find_tests_for_method(&sln, "App.Calc.Add(int,int)", CancelToken::new())
            .await
            .unwrap();
        assert_eq!(result.coverage.len(), 1);
        let info = &result.coverage[0];
        assert_eq!(info.test_name, "Add_TwoPositives_ReturnsSum");
        assert!(info.is_direct);
        assert_eq!(info.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_second_build_hits_cache() {
        let temp = tempfile::tempdir().unwrap();
        let sln = fixture(temp.path());

        {
            let engine = engine_for(temp.path());
            let first = engine
                .build_call_graph(&sln, CancelToken::new())
                .await
                .unwrap();
            assert!(!first.from_cache);
        }
        // Fresh engine, same cache dir: disk cache serves the graph
        let engine = engine_for(temp.path());
        let second = engine
            .build_call_graph(&sln, CancelToken::new())
            .await
            .unwrap();
        assert!(second.from_cache);
    }

    #[tokio::test]
    async fn test_trace_execution_orders_calls() {
        let temp = tempfile::tempdir().unwrap();
        let sln = fixture(temp.path());
        let engine = engine_for(temp.path());

        let trace = engine
            .trace_execution(
                &sln,
                "App.Tests.CalcTests.Add_TwoPositives_ReturnsSum()",
                5,
                CancelToken::new(),
            )
            .await
            .unwrap();
        assert!(trace.nodes.len() >= 2);
        assert_eq!(trace.nodes[0].depth, 0);
        assert!(trace
            .nodes
            .iter()
            .any(|n| n.method.qualified_name() == "App.Calc.Add(int,int)"));
    }

    #[tokio::test]
    async fn test_cancellation_aborts() {
        let temp = tempfile::tempdir().unwrap();
        let sln = fixture(temp.path());
        let engine = engine_for(temp.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            engine.build_call_graph(&sln, cancel).await,
            Err(EngineError::Canceled)
        ));
    }
}
