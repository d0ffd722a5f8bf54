//! Test coverage analyzer
//!
//! Maps production methods to the tests that reach them. Test methods are
//! identified once per solution; per-target queries run a bounded reverse
//! BFS over the call graph, reconstruct the shortest call path from each
//! reached test down to the target, and score the pair with a deterministic
//! confidence in [0,1].

use std::collections::BTreeMap;
use std::collections::VecDeque;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::coverage::classify::{self, TestCategory, TestFramework};
use crate::error::{Result, Warning, WarningCategory};
use crate::graph::model::MethodCallGraph;
use crate::symbols::id::MethodId;
use crate::syntax;
use crate::error::AnalysisStatus;
use crate::workspace::Workspace;

// Confidence model constants. These are fixed weights of the scoring
// formula; results must reproduce bit-identically across runs.
pub const BASE_CONFIDENCE: f64 = 1.0;
pub const HOP_PENALTY: f64 = 0.05;
pub const NAME_MATCH_BONUS: f64 = 0.25;
pub const TYPE_MATCH_BONUS: f64 = 0.20;
pub const NAMESPACE_BONUS: f64 = 0.10;
pub const UNIT_TEST_BONUS: f64 = 0.05;

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_VISITED: usize = 1000;

/// Fixed reason vocabulary carried on results
pub mod reasons {
    pub const DIRECT_CALL: &str = "Direct method call";
    pub const NAME_SIMILARITY: &str = "Method name similarity";
    pub const TYPE_SIMILARITY: &str = "Type name similarity";
    pub const NAMESPACE_SIMILARITY: &str = "Namespace similarity";
    pub const TRANSITIVE: &str = "Transitive call";
    pub const DEEP_TRANSITIVE: &str = "Deep transitive call";
    pub const WEAK_CORRELATION: &str = "Weak method correlation";
}

/// One test-to-method coverage tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCoverageInfo {
    /// Test method id
    pub test: MethodId,

    /// Test simple name
    pub test_name: String,

    /// Test declaring type simple name
    pub test_type: String,

    pub framework: TestFramework,
    pub category: TestCategory,

    /// Covered production method id
    pub target: MethodId,

    /// Ordered chain of method ids from the test down to the target
    pub call_path: Vec<MethodId>,

    /// `call_path.len() - 1`
    pub depth: usize,

    pub is_direct: bool,

    /// Deterministic score in [0,1]
    pub confidence: f64,

    /// Short reason strings from the fixed vocabulary
    pub reasons: Vec<String>,
}

/// Metadata recorded per identified test method
#[derive(Debug, Clone, Copy)]
pub struct TestMeta {
    pub framework: TestFramework,
    pub category: TestCategory,
}

/// All test methods of a solution, identified once and reused
#[derive(Debug, Default)]
pub struct TestCatalog {
    tests: AHashMap<MethodId, TestMeta>,
}

impl TestCatalog {
    /// Identify test methods by compiling only the projects classified as
    /// test infrastructure.
    pub fn identify(workspace: &Workspace, cancel: &CancelToken) -> Result<Self> {
        let mut catalog = Self::default();
        let test_projects: Vec<String> = workspace
            .solution()
            .projects
            .iter()
            .filter(|p| p.is_test_project)
            .map(|p| p.name.clone())
            .collect();

        for name in &test_projects {
            cancel.check()?;
            let project = match workspace.solution().project(name) {
                Some(p) => p.clone(),
                None => continue,
            };
            let compilation = match workspace.compilation(name, cancel) {
                Ok(c) => c,
                Err(crate::error::EngineError::Canceled) => {
                    return Err(crate::error::EngineError::Canceled)
                }
                Err(_) => continue,
            };
            for (fqn, ty) in compilation.all_types() {
                for method in &ty.methods {
                    if !classify::is_test_method(method, ty, &project) {
                        continue;
                    }
                    let id = MethodId::new(
                        fqn.clone(),
                        syntax::with_arity(
                            method.name.split('`').next().unwrap_or(&method.name),
                            method.generic_arity,
                        ),
                        method.params.iter().map(|p| p.ty.clone()).collect(),
                    );
                    let meta = TestMeta {
                        framework: classify::classify_framework(method, &project),
                        category: classify::classify_category(
                            &ty.namespace,
                            &ty.name,
                            &project,
                        ),
                    };
                    catalog.tests.insert(id, meta);
                }
            }
        }
        debug!(tests = catalog.tests.len(), "test catalog built");
        Ok(catalog)
    }

    pub fn is_test(&self, id: &MethodId) -> bool {
        self.tests.contains_key(id)
    }

    pub fn meta(&self, id: &MethodId) -> Option<TestMeta> {
        self.tests.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Sorted test ids
    pub fn ids(&self) -> Vec<&MethodId> {
        let mut ids: Vec<&MethodId> = self.tests.keys().collect();
        ids.sort();
        ids
    }

    /// Flag the catalog's tests on a graph's method metadata
    pub fn mark_graph(&self, graph: &mut MethodCallGraph) {
        for id in self.tests.keys() {
            graph.mark_test(id);
        }
    }

    /// Direct insertion hook for unit tests building synthetic catalogs
    #[cfg(test)]
    pub fn insert_for_tests(&mut self, id: MethodId, meta: TestMeta) {
        self.tests.insert(id, meta);
    }
}

/// Bounds for the reverse traversal
#[derive(Debug, Clone, Copy)]
pub struct CoverageOptions {
    pub max_depth: usize,
    pub max_visited_nodes: usize,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_visited_nodes: DEFAULT_MAX_VISITED,
        }
    }
}

/// Result of one coverage query
#[derive(Debug, Serialize)]
pub struct CoverageResult {
    pub target: MethodId,
    pub status: AnalysisStatus,
    pub coverage: Vec<TestCoverageInfo>,
    pub warnings: Vec<Warning>,
}

/// Bulk reverse index: production method -> covering tests
#[derive(Debug, Default, Serialize)]
pub struct CoverageMap {
    pub status: AnalysisStatus,
    /// Sorted by production method id for deterministic output
    pub entries: BTreeMap<String, Vec<TestCoverageInfo>>,
}

/// Find the tests covering one production method.
///
/// An unresolvable target yields an empty `complete` result with a warning
/// rather than an error; traversal bound hits yield `partial`.
pub fn find_tests_for_method(
    graph: &MethodCallGraph,
    catalog: &TestCatalog,
    target: &MethodId,
    options: &CoverageOptions,
) -> CoverageResult {
    if !graph.contains(target) {
        return CoverageResult {
            target: target.clone(),
            status: AnalysisStatus::Complete,
            coverage: Vec::new(),
            warnings: vec![Warning::new(
                WarningCategory::Resolution,
                format!("method not found in call graph: {}", target),
            )],
        };
    }

    let (paths, truncated) = reverse_paths_to_tests(graph, catalog, target, options);
    let mut coverage: Vec<TestCoverageInfo> = paths
        .into_iter()
        .map(|path| build_info(catalog, path, target))
        .collect();
    sort_coverage(&mut coverage);

    CoverageResult {
        target: target.clone(),
        status: if truncated {
            AnalysisStatus::Partial
        } else {
            AnalysisStatus::Complete
        },
        coverage,
        warnings: Vec::new(),
    }
}

/// Build the bulk coverage map for every production method reached by any
/// test within the bounds.
pub fn build_coverage_map(
    graph: &MethodCallGraph,
    catalog: &TestCatalog,
    options: &CoverageOptions,
) -> CoverageMap {
    let mut map: BTreeMap<String, Vec<TestCoverageInfo>> = BTreeMap::new();
    let mut truncated = false;

    for test in catalog.ids() {
        if !graph.contains(test) {
            continue;
        }
        // Forward BFS from the test; first visit fixes the shortest path
        let mut parent: AHashMap<MethodId, MethodId> = AHashMap::new();
        let mut depth_of: AHashMap<MethodId, usize> = AHashMap::new();
        let mut queue: VecDeque<MethodId> = VecDeque::new();
        depth_of.insert(test.clone(), 0);
        queue.push_back(test.clone());

        while let Some(current) = queue.pop_front() {
            let depth = depth_of[&current];
            if depth >= options.max_depth {
                truncated = true;
                continue;
            }
            if depth_of.len() > options.max_visited_nodes {
                truncated = true;
                break;
            }
            let mut callees: Vec<&MethodId> = graph.callees(&current).iter().collect();
            callees.sort();
            for callee in callees {
                if depth_of.contains_key(callee) {
                    continue;
                }
                depth_of.insert(callee.clone(), depth + 1);
                parent.insert(callee.clone(), current.clone());
                queue.push_back(callee.clone());
            }
        }

        for (node, _) in depth_of.iter() {
            if node == test || catalog.is_test(node) {
                continue;
            }
            // Skip external stubs; the map covers declared production code
            let declared = graph
                .method(node)
                .map(|m| !m.is_external)
                .unwrap_or(false);
            if !declared {
                continue;
            }
            let mut path = vec![node.clone()];
            let mut cursor = node.clone();
            while let Some(p) = parent.get(&cursor) {
                path.push(p.clone());
                cursor = p.clone();
            }
            path.reverse();
            let info = build_info(catalog, path, node);
            map.entry(node.qualified_name()).or_default().push(info);
        }
    }

    for list in map.values_mut() {
        sort_coverage(list);
    }

    CoverageMap {
        status: if truncated {
            AnalysisStatus::Partial
        } else {
            AnalysisStatus::Complete
        },
        entries: map,
    }
}

/// Bounded reverse BFS from the target; returns one shortest path per
/// reached test (test first, target last) plus a truncation flag.
fn reverse_paths_to_tests(
    graph: &MethodCallGraph,
    catalog: &TestCatalog,
    target: &MethodId,
    options: &CoverageOptions,
) -> (Vec<Vec<MethodId>>, bool) {
    // parent points one hop toward the target
    let mut parent: AHashMap<MethodId, MethodId> = AHashMap::new();
    let mut depth_of: AHashMap<MethodId, usize> = AHashMap::new();
    let mut queue: VecDeque<MethodId> = VecDeque::new();
    let mut reached_tests: Vec<MethodId> = Vec::new();
    let mut truncated = false;

    depth_of.insert(target.clone(), 0);
    queue.push_back(target.clone());

    while let Some(current) = queue.pop_front() {
        let depth = depth_of[&current];
        if depth >= options.max_depth {
            truncated = true;
            continue;
        }
        if depth_of.len() > options.max_visited_nodes {
            truncated = true;
            break;
        }

        // Sorted expansion: equal-depth ties resolve toward the caller with
        // the lexicographically smaller id.
        let mut callers: Vec<&MethodId> = graph.callers(&current).iter().collect();
        callers.sort();
        for caller in callers {
            if depth_of.contains_key(caller) {
                continue;
            }
            depth_of.insert(caller.clone(), depth + 1);
            parent.insert(caller.clone(), current.clone());
            if catalog.is_test(caller) {
                reached_tests.push(caller.clone());
                // A test terminates its branch; paths never pass through one
                continue;
            }
            queue.push_back(caller.clone());
        }
    }

    reached_tests.sort();
    let paths = reached_tests
        .into_iter()
        .map(|test| {
            let mut path = vec![test.clone()];
            let mut cursor = test;
            while let Some(next) = parent.get(&cursor) {
                path.push(next.clone());
                cursor = next.clone();
            }
            path
        })
        .collect();
    (paths, truncated)
}

/// Assemble a `TestCoverageInfo` from a call path (test first, target last)
fn build_info(catalog: &TestCatalog, call_path: Vec<MethodId>, target: &MethodId) -> TestCoverageInfo {
    let test = call_path[0].clone();
    let depth = call_path.len() - 1;
    let meta = catalog.meta(&test).unwrap_or(TestMeta {
        framework: TestFramework::Unknown,
        category: TestCategory::Unknown,
    });
    let (confidence, reason_list) = confidence_and_reasons(&test, target, depth, meta.category);

    TestCoverageInfo {
        test_name: test.simple_name().to_string(),
        test_type: test.type_simple_name().to_string(),
        framework: meta.framework,
        category: meta.category,
        target: target.clone(),
        depth,
        is_direct: depth == 1,
        confidence,
        reasons: reason_list,
        call_path,
        test,
    }
}

/// The fixed confidence formula.
///
/// Base 1.0, minus 0.05 per hop beyond the first, plus similarity bonuses,
/// clamped to [0,1]. Reasons mirror exactly the terms that applied.
pub fn confidence_and_reasons(
    test: &MethodId,
    target: &MethodId,
    depth: usize,
    category: TestCategory,
) -> (f64, Vec<String>) {
    let mut confidence = BASE_CONFIDENCE - HOP_PENALTY * depth.saturating_sub(1) as f64;
    let mut out = Vec::new();

    if depth <= 1 {
        out.push(reasons::DIRECT_CALL.to_string());
    } else if depth <= 3 {
        out.push(reasons::TRANSITIVE.to_string());
    } else {
        out.push(reasons::DEEP_TRANSITIVE.to_string());
    }

    let test_name = test.simple_name().to_ascii_lowercase();
    let target_name = target.simple_name().to_ascii_lowercase();
    let mut similar = false;
    if !target_name.is_empty() && test_name.contains(&target_name) {
        confidence += NAME_MATCH_BONUS;
        out.push(reasons::NAME_SIMILARITY.to_string());
        similar = true;
    }

    let test_type = test.type_simple_name().to_ascii_lowercase();
    let target_type = target.type_simple_name().to_ascii_lowercase();
    if !target_type.is_empty() && test_type.contains(&target_type) {
        confidence += TYPE_MATCH_BONUS;
        out.push(reasons::TYPE_SIMILARITY.to_string());
        similar = true;
    }

    if test.shared_namespace_segments(target) >= 2 {
        confidence += NAMESPACE_BONUS;
        out.push(reasons::NAMESPACE_SIMILARITY.to_string());
        similar = true;
    }

    if category == TestCategory::Unit {
        confidence += UNIT_TEST_BONUS;
    }

    if !similar && depth > 3 {
        out.push(reasons::WEAK_CORRELATION.to_string());
    }

    (confidence.clamp(0.0, 1.0), out)
}

/// Order: confidence descending, depth ascending, test id lexicographic
pub fn sort_coverage(coverage: &mut [TestCoverageInfo]) {
    coverage.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| a.test.cmp(&b.test))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::CallEdgeKind;

    fn id(ty: &str, name: &str) -> MethodId {
        MethodId::new(ty, name, vec![])
    }

    fn catalog_with(tests: &[(&MethodId, TestCategory)]) -> TestCatalog {
        let mut catalog = TestCatalog::default();
        for (test, category) in tests {
            catalog.tests.insert(
                (*test).clone(),
                TestMeta {
                    framework: TestFramework::XUnit,
                    category: *category,
                },
            );
        }
        catalog
    }

    #[test]
    fn test_direct_coverage_scores_one() {
        let test = MethodId::new(
            "MyApp.Tests.CalcTests",
            "Add_TwoPositives_ReturnsSum",
            vec![],
        );
        let target = MethodId::new("MyApp.Calc", "Add", vec!["int".into(), "int".into()]);

        let mut graph = MethodCallGraph::new();
        graph.add_edge(test.clone(), target.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let result =
            find_tests_for_method(&graph, &catalog, &target, &CoverageOptions::default());
        assert_eq!(result.status, AnalysisStatus::Complete);
        assert_eq!(result.coverage.len(), 1);

        let info = &result.coverage[0];
        assert_eq!(info.call_path, vec![test, target]);
        assert_eq!(info.depth, 1);
        assert!(info.is_direct);
        assert_eq!(info.confidence, 1.0);
        assert!(info.reasons.contains(&reasons::DIRECT_CALL.to_string()));
        assert!(info.reasons.contains(&reasons::NAME_SIMILARITY.to_string()));
        assert!(info.reasons.contains(&reasons::TYPE_SIMILARITY.to_string()));
    }

    #[test]
    fn test_transitive_coverage_depth_two() {
        let test = id("App.Tests.SvcTests", "CreateUser_Valid_Succeeds");
        let create = id("App.UserService", "CreateUser");
        let validate = id("App.UserService", "Validate");

        let mut graph = MethodCallGraph::new();
        graph.add_edge(test.clone(), create.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(create.clone(), validate.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let result =
            find_tests_for_method(&graph, &catalog, &validate, &CoverageOptions::default());
        assert_eq!(result.coverage.len(), 1);
        let info = &result.coverage[0];
        assert_eq!(info.depth, 2);
        assert_eq!(info.call_path.len(), 3);
        assert!(!info.is_direct);
        // 1.0 - 0.05 hop + 0.05 unit, clamped
        assert!((info.confidence - 1.0).abs() < 1e-9);
        assert!(info.reasons.contains(&reasons::TRANSITIVE.to_string()));
    }

    #[test]
    fn test_no_coverage_is_complete_and_empty() {
        let unused = id("App.Helper", "Unused");
        let mut graph = MethodCallGraph::new();
        graph.register(crate::graph::model::MethodInfo::external(unused.clone()));
        let catalog = TestCatalog::default();

        let result =
            find_tests_for_method(&graph, &catalog, &unused, &CoverageOptions::default());
        assert_eq!(result.status, AnalysisStatus::Complete);
        assert!(result.coverage.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unresolvable_target_warns() {
        let graph = MethodCallGraph::new();
        let catalog = TestCatalog::default();
        let ghost = id("App.Ghost", "Gone");

        let result =
            find_tests_for_method(&graph, &catalog, &ghost, &CoverageOptions::default());
        assert_eq!(result.status, AnalysisStatus::Complete);
        assert!(result.coverage.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_direct_confidence_dominates_indirect() {
        let test = id("T.Tests", "Direct_And_Indirect");
        let via = id("App.Mid", "Via");
        let target = id("App.Svc", "Work");

        let mut graph = MethodCallGraph::new();
        graph.add_edge(test.clone(), target.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(test.clone(), via.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(via, target.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let result =
            find_tests_for_method(&graph, &catalog, &target, &CoverageOptions::default());
        // BFS keeps the shortest (direct) path for the pair
        assert_eq!(result.coverage.len(), 1);
        assert_eq!(result.coverage[0].depth, 1);
    }

    #[test]
    fn test_depth_bound_marks_partial() {
        let mut graph = MethodCallGraph::new();
        let mut prev = id("App.C", "m0");
        for i in 1..6 {
            let next = id("App.C", &format!("m{}", i));
            graph.add_edge(next.clone(), prev.clone(), CallEdgeKind::DirectCall);
            prev = next;
        }
        let test = id("T.Tests", "Far");
        graph.add_edge(test.clone(), prev, CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let options = CoverageOptions {
            max_depth: 2,
            max_visited_nodes: 1000,
        };
        let result = find_tests_for_method(&graph, &catalog, &id("App.C", "m0"), &options);
        assert_eq!(result.status, AnalysisStatus::Partial);
        assert!(result.coverage.is_empty());
    }

    #[test]
    fn test_tie_break_prefers_smaller_intermediate() {
        let test = id("T.Tests", "Covers");
        let via_a = id("App.AAA", "Step");
        let via_b = id("App.BBB", "Step");
        let target = id("App.Svc", "Work");

        let mut graph = MethodCallGraph::new();
        graph.add_edge(test.clone(), via_b.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(test.clone(), via_a.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(via_b, target.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(via_a.clone(), target.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let result =
            find_tests_for_method(&graph, &catalog, &target, &CoverageOptions::default());
        assert_eq!(result.coverage.len(), 1);
        assert_eq!(result.coverage[0].call_path[1], via_a);
    }

    #[test]
    fn test_sorting_order() {
        let t_low = id("T.Tests", "ZLow");
        let t_high = id("T.Tests", "Work_Succeeds");
        let target = id("App.Svc", "Work");

        let mut graph = MethodCallGraph::new();
        graph.add_edge(t_high.clone(), target.clone(), CallEdgeKind::DirectCall);
        graph.add_edge(t_low.clone(), target.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[
            (&t_low, TestCategory::Unknown),
            (&t_high, TestCategory::Unit),
        ]);

        let result =
            find_tests_for_method(&graph, &catalog, &target, &CoverageOptions::default());
        assert_eq!(result.coverage.len(), 2);
        assert!(result.coverage[0].confidence >= result.coverage[1].confidence);
        assert_eq!(result.coverage[0].test, t_high);
    }

    #[test]
    fn test_coverage_map_keys_reachable_only() {
        let test = id("T.Tests", "Covers");
        let reached = id("App.Svc", "Reached");
        let unreached = id("App.Svc", "Unreached");

        let mut graph = MethodCallGraph::new();
        graph.register(crate::graph::model::MethodInfo::declared(
            reached.clone(),
            "Svc.cs".into(),
            1,
        ));
        graph.register(crate::graph::model::MethodInfo::declared(
            unreached.clone(),
            "Svc.cs".into(),
            9,
        ));
        graph.add_edge(test.clone(), reached.clone(), CallEdgeKind::DirectCall);
        let catalog = catalog_with(&[(&test, TestCategory::Unit)]);

        let map = build_coverage_map(&graph, &catalog, &CoverageOptions::default());
        assert!(map.entries.contains_key(&reached.qualified_name()));
        assert!(!map.entries.contains_key(&unreached.qualified_name()));
    }
}
