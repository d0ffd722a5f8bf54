//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{EngineOptions, ProjectFilter, ProjectTypeMarker};
use crate::impact::ConfidenceLevel;

/// Static test-impact analysis for C# solutions
#[derive(Parser, Debug)]
#[command(name = "testmap")]
#[command(about = "Select the tests most likely to exercise your changes")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the per-solution cache root
    #[arg(long, value_name = "DIR", global = true, env = "TESTMAP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Depth bound for graph traversals
    #[arg(long, default_value = "10", global = true)]
    pub max_depth: usize,

    /// Per-project analysis timeout in seconds
    #[arg(long, default_value = "300", global = true)]
    pub timeout_seconds: u64,

    /// Include only projects matching these glob patterns (repeatable)
    #[arg(long = "include", value_name = "GLOB", global = true)]
    pub include_projects: Vec<String>,

    /// Exclude projects matching these glob patterns (repeatable, wins over include)
    #[arg(long = "exclude", value_name = "GLOB", global = true)]
    pub exclude_projects: Vec<String>,

    /// Exclude projects matching these heuristic type markers (repeatable)
    #[arg(long = "exclude-type", value_enum, global = true)]
    pub exclude_types: Vec<ProjectTypeMarker>,

    /// Restrict analysis to test projects
    #[arg(long, global = true)]
    pub test_projects_only: bool,

    /// Also record edges to known interface/virtual implementations
    #[arg(long, global = true)]
    pub inclusive_dispatch: bool,

    /// Worker threads for per-file parallelism (default: available cores)
    #[arg(long, value_name = "N", global = true)]
    pub max_parallelism: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Deterministic JSON
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a solution: projects, sources, and test counts
    Analyze {
        /// Path to the .sln file
        solution: PathBuf,
    },

    /// Build the full method call graph
    Callgraph {
        solution: PathBuf,

        /// Print only the build statistics
        #[arg(long)]
        stats_only: bool,
    },

    /// Find the tests covering a production method
    TestsFor {
        solution: PathBuf,

        /// Canonical method id, e.g. 'MyApp.Calc.Add(int,int)'
        #[arg(long)]
        method: String,
    },

    /// Build the bulk production-method -> tests coverage map
    Coverage {
        solution: PathBuf,
    },

    /// Impact analysis for a change set
    Diff {
        solution: PathBuf,

        /// JSON change-set file (produced by a diff parser)
        #[arg(long, value_name = "FILE")]
        changes: PathBuf,
    },

    /// Select tests for a change set at a confidence level
    Select {
        solution: PathBuf,

        #[arg(long, value_name = "FILE")]
        changes: PathBuf,

        /// Quality/cost trade-off
        #[arg(long, value_enum)]
        level: Option<ConfidenceLevel>,

        /// Cap on the number of selected tests
        #[arg(long)]
        max_count: Option<usize>,

        /// Cap on total estimated duration in seconds
        #[arg(long)]
        max_duration: Option<f64>,

        /// Only these categories (repeatable)
        #[arg(long = "include-category", value_enum)]
        include_categories: Vec<crate::coverage::TestCategory>,

        /// Never these categories (repeatable)
        #[arg(long = "exclude-category", value_enum)]
        exclude_categories: Vec<crate::coverage::TestCategory>,
    },

    /// Trace the ordered call tree from a test method
    Trace {
        solution: PathBuf,

        /// Canonical test method id
        #[arg(long)]
        test: String,

        /// Trace depth bound
        #[arg(long, default_value = "10")]
        depth: usize,
    },

    /// Manage the per-solution cache
    Cache {
        solution: PathBuf,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Create the cache partition and record the baseline snapshot
    Init,
    /// Build and persist the call graph and test catalog ahead of queries
    Warmup,
    /// Show partition location and size
    Status,
    /// Show per-store statistics
    Stats,
    /// Delete every cached entry for this solution
    Clear,
}

impl Cli {
    /// Engine options assembled from the global flags
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            projects: ProjectFilter {
                include: self.include_projects.clone(),
                exclude: self.exclude_projects.clone(),
                exclude_types: self.exclude_types.clone(),
                test_projects_only: self.test_projects_only,
            },
            max_parallelism: self.max_parallelism,
            timeout_seconds: self.timeout_seconds,
            max_depth: self.max_depth,
            cache_dir: self.cache_dir.clone(),
            confidence_level: ConfidenceLevel::Medium,
            inclusive_dispatch: self.inclusive_dispatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tests_for() {
        let cli = Cli::try_parse_from([
            "testmap",
            "tests-for",
            "App.sln",
            "--method",
            "App.Calc.Add(int,int)",
        ])
        .unwrap();
        match cli.command {
            Command::TestsFor { method, .. } => {
                assert_eq!(method, "App.Calc.Add(int,int)");
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_global_flags_build_options() {
        let cli = Cli::try_parse_from([
            "testmap",
            "--max-depth",
            "5",
            "--exclude",
            "*.Migrations",
            "analyze",
            "App.sln",
        ])
        .unwrap();
        let options = cli.engine_options();
        assert_eq!(options.max_depth, 5);
        assert_eq!(options.projects.exclude, vec!["*.Migrations"]);
    }

    #[test]
    fn test_cache_subcommands() {
        let cli = Cli::try_parse_from(["testmap", "cache", "App.sln", "warmup"]).unwrap();
        match cli.command {
            Command::Cache { action, .. } => assert!(matches!(action, CacheAction::Warmup)),
            _ => panic!("wrong command"),
        }
    }
}
