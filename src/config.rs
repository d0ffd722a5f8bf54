//! Engine configuration surface
//!
//! Options understood by the engine, as provided by the CLI or a host
//! service. Project filtering is pattern-based; patterns use `*`/`?`
//! wildcards and are compiled to anchored regexes.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::impact::ConfidenceLevel;
use crate::project::ProjectInfo;

/// Heuristic project-type markers for `projects.exclude-types`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProjectTypeMarker {
    Orm,
    Database,
    Migration,
    Integration,
    Api,
    Ui,
}

impl ProjectTypeMarker {
    /// Content markers indicating a project matches this type
    fn matches(&self, project: &ProjectInfo) -> bool {
        let name = project.name.to_ascii_lowercase();
        match self {
            Self::Orm => {
                project.references_package("entityframework")
                    || project.references_package("dapper")
                    || project.references_package("nhibernate")
            }
            Self::Database => {
                name.contains("database")
                    || name.contains(".data")
                    || project.references_package("sqlclient")
                    || project.references_package("npgsql")
            }
            Self::Migration => {
                name.contains("migration") || project.references_package("fluentmigrator")
            }
            Self::Integration => name.contains("integration"),
            Self::Api => {
                name.contains("api") || project.references_package("aspnetcore")
            }
            Self::Ui => {
                name.contains("ui")
                    || name.contains("web")
                    || project.references_package("blazor")
            }
        }
    }
}

/// Project inclusion/exclusion settings
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Glob patterns; empty means all projects
    pub include: Vec<String>,

    /// Glob patterns; exclusion takes precedence over inclusion
    pub exclude: Vec<String>,

    /// Heuristic content-marker exclusions
    pub exclude_types: Vec<ProjectTypeMarker>,

    pub test_projects_only: bool,
}

impl ProjectFilter {
    /// Whether a project passes the filter
    pub fn matches(&self, project: &ProjectInfo) -> Result<bool> {
        if self.test_projects_only && !project.is_test_project {
            return Ok(false);
        }
        for pattern in &self.exclude {
            if glob_to_regex(pattern)?.is_match(&project.name) {
                return Ok(false);
            }
        }
        if self.exclude_types.iter().any(|m| m.matches(project)) {
            return Ok(false);
        }
        if self.include.is_empty() {
            return Ok(true);
        }
        for pattern in &self.include {
            if glob_to_regex(pattern)?.is_match(&project.name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Names of matching projects, in solution order
    pub fn select<'a>(&self, projects: &'a [ProjectInfo]) -> Result<Vec<&'a ProjectInfo>> {
        let mut out = Vec::new();
        for project in projects {
            if self.matches(project)? {
                out.push(project);
            }
        }
        Ok(out)
    }
}

/// Compile a `*`/`?` wildcard pattern to an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c if "\\.+()[]{}|^$".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|_| EngineError::InvalidPattern {
        pattern: pattern.to_string(),
    })
}

/// Options understood by the engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub projects: ProjectFilter,

    /// Worker threads for per-file parallelism; `None` = available cores
    pub max_parallelism: Option<usize>,

    /// Per-project analysis timeout
    pub timeout_seconds: u64,

    /// Depth bound for BFS traversals
    pub max_depth: usize,

    /// Override the default per-solution cache root
    pub cache_dir: Option<PathBuf>,

    /// Selection quality/cost trade-off
    pub confidence_level: ConfidenceLevel,

    /// Record edges to known interface/virtual implementations
    pub inclusive_dispatch: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            projects: ProjectFilter::default(),
            max_parallelism: None,
            timeout_seconds: 300,
            max_depth: 10,
            cache_dir: None,
            confidence_level: ConfidenceLevel::Medium,
            inclusive_dispatch: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{finalize_project, parse_project_file};
    use std::fs;

    fn project(name: &str, packages: &str) -> (tempfile::TempDir, ProjectInfo) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(format!("{}.csproj", name));
        fs::write(
            &path,
            format!("<Project><ItemGroup>{}</ItemGroup></Project>", packages),
        )
        .unwrap();
        let parsed = parse_project_file(name, &path).unwrap();
        (temp, finalize_project(&parsed, vec![], &[]))
    }

    #[test]
    fn test_glob_patterns() {
        assert!(glob_to_regex("App.*").unwrap().is_match("App.Core"));
        assert!(!glob_to_regex("App.*").unwrap().is_match("Lib.Core"));
        assert!(glob_to_regex("*Tests").unwrap().is_match("App.UnitTests"));
        assert!(glob_to_regex("?pp").unwrap().is_match("App"));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let (_t, p) = project("App.Core", "");
        let filter = ProjectFilter {
            include: vec!["App.*".to_string()],
            exclude: vec!["*.Core".to_string()],
            ..Default::default()
        };
        assert!(!filter.matches(&p).unwrap());
    }

    #[test]
    fn test_exclude_types_orm() {
        let (_t, p) = project(
            "App.Persistence",
            "<PackageReference Include=\"Dapper\" Version=\"2.0\" />",
        );
        let filter = ProjectFilter {
            exclude_types: vec![ProjectTypeMarker::Orm],
            ..Default::default()
        };
        assert!(!filter.matches(&p).unwrap());
    }

    #[test]
    fn test_test_projects_only() {
        let (_t, test_proj) = project(
            "App.Tests",
            "<PackageReference Include=\"xunit\" Version=\"2.6\" />",
        );
        let (_t2, plain) = project("App.Core", "");
        let filter = ProjectFilter {
            test_projects_only: true,
            ..Default::default()
        };
        assert!(filter.matches(&test_proj).unwrap());
        assert!(!filter.matches(&plain).unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_ok_after_escaping() {
        // Characters that are regex metacharacters are escaped, not errors
        assert!(glob_to_regex("App.[Core]").is_ok());
    }
}
