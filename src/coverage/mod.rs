//! Reverse test-coverage analysis

pub mod analyzer;
pub mod classify;

pub use analyzer::{
    build_coverage_map, find_tests_for_method, CoverageMap, CoverageOptions, CoverageResult,
    TestCatalog, TestCoverageInfo,
};
pub use classify::{TestCategory, TestFramework};
