//! testmap-engine: static test-impact analysis for C# solutions
//!
//! Given a set of source changes in a multi-project solution, the engine
//! selects the automated tests most likely to exercise the changed code,
//! ranked by a deterministic confidence score. The inverse query (which
//! tests cover this method?) and diff-driven impact analysis share the same
//! machinery: a solution-wide semantic call graph, an incremental variant
//! that expands from seed methods, a reverse coverage analyzer, and a
//! multi-tier persistent cache with snapshot-based invalidation.
//!
//! Parsing uses tree-sitter with the C# grammar; no compiler services are
//! invoked and no test is ever executed.

pub mod cache;
pub mod cancel;
pub mod commands;
pub mod compilation;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hashing;
pub mod impact;
pub mod project;
pub mod solution;
pub mod symbols;
pub mod syntax;
pub mod workspace;

pub mod cli;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use cli::{Cli, OutputFormat};
pub use config::{EngineOptions, ProjectFilter, ProjectTypeMarker};
pub use engine::{ExecutionTrace, GraphAnalysis, ImpactEngine, SolutionAnalysis};
pub use error::{AnalysisStatus, EngineError, Result, Warning, WarningCategory};

// Re-export workspace and graph types
pub use compilation::{Compilation, SemanticModel};
pub use graph::{
    build_full, CallEdgeKind, GraphOptions, IncrementalBuilder, IncrementalOptions,
    MethodCallGraph, MethodInfo, SerializableGraph, TraverseDirection,
};
pub use solution::Solution;
pub use symbols::{MethodId, SymbolIndex, SymbolResolver};
pub use workspace::{MetadataResolver, Workspace};

// Re-export coverage and impact types
pub use coverage::{
    CoverageMap, CoverageOptions, CoverageResult, TestCatalog, TestCategory, TestCoverageInfo,
    TestFramework,
};
pub use impact::{
    analyze_changes, select_tests, ChangeKind, ChangeSet, ConfidenceBucket, ConfidenceLevel,
    FileChange, ImpactResult, SelectionConstraints, TestSelection,
};

// Re-export cache types
pub use cache::{CacheManager, CacheStats, CacheStore, CacheTier};
