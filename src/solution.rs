//! Solution manifest parsing and project discovery
//!
//! Reads a `.sln` manifest, parses every project file it names, resolves
//! inter-project references into a dependency DAG, rejects cycles, and
//! produces the topological order every compilation pass follows. Nothing is
//! compiled here.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::hashing::hash_hex;
use crate::project::{self, ParsedProject, ProjectInfo};

static SLN_PROJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^Project\("\{[^}]*\}"\)\s*=\s*"([^"]+)",\s*"([^"]+)",\s*"\{([^}]*)\}""#)
        .unwrap()
});

/// A solution: the aggregate of all discovered projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Absolute path to the `.sln` file
    pub path: PathBuf,

    /// Solution file stem, e.g. `MyApp`
    pub name: String,

    /// Projects in topological (dependency-first) order
    pub projects: Vec<ProjectInfo>,
}

impl Solution {
    /// Load a solution manifest and all project files it references.
    ///
    /// Fails with `SolutionParse` for a malformed manifest, `ProjectMissing`
    /// for an absent project file, and `DependencyCycle` when project
    /// references are circular.
    pub fn load(path: &Path) -> Result<Self> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let content = fs::read_to_string(&path).map_err(|e| EngineError::SolutionParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "solution".to_string());

        let sln_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut parsed: Vec<ParsedProject> = Vec::new();
        for cap in SLN_PROJECT_LINE.captures_iter(&content) {
            let project_name = cap[1].to_string();
            let raw_path = cap[2].to_string();
            // Solution folders and non-C# projects are listed with the same
            // syntax; only .csproj entries are compilation units here.
            if !raw_path.to_ascii_lowercase().ends_with(".csproj") {
                continue;
            }
            let project_path = project::resolve_manifest_path(&sln_dir, &raw_path);
            parsed.push(project::parse_project_file(&project_name, &project_path)?);
        }

        if parsed.is_empty() {
            return Err(EngineError::SolutionParse {
                path: path.display().to_string(),
                message: "no project entries found in manifest".to_string(),
            });
        }

        let order = topological_order(&parsed)?;
        let projects = finalize_in_order(&parsed, &order);
        debug!(solution = %name, projects = projects.len(), "solution loaded");

        Ok(Self { path, name, projects })
    }

    /// Stable hash used as the per-solution cache partition name
    pub fn partition_hash(&self) -> String {
        hash_hex(&self.path.to_string_lossy())
    }

    /// Find a project by name
    pub fn project(&self, name: &str) -> Option<&ProjectInfo> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Names of projects that directly depend on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.projects
            .iter()
            .filter(|p| p.project_references.iter().any(|r| r == name))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Transitive dependencies of a project, dependency-first
    pub fn transitive_dependencies(&self, name: &str) -> Vec<&str> {
        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);
        while let Some(current) = queue.pop_front() {
            if let Some(project) = self.project(current) {
                for dep in &project.project_references {
                    if seen.insert(dep.as_str()) {
                        queue.push_back(dep);
                    }
                }
            }
        }
        // Report in the solution's topological order so callers can compile
        // prerequisites front to back.
        for project in &self.projects {
            if seen.contains(project.name.as_str()) {
                out.push(project.name.as_str());
            }
        }
        out
    }
}

/// Map each parsed project's reference paths to project names
fn reference_names(parsed: &[ParsedProject]) -> AHashMap<String, Vec<String>> {
    let by_path: AHashMap<PathBuf, &str> = parsed
        .iter()
        .map(|p| (p.path.clone(), p.name.as_str()))
        .collect();

    parsed
        .iter()
        .map(|p| {
            let refs = p
                .project_reference_paths
                .iter()
                .filter_map(|path| {
                    by_path.get(path).map(|n| n.to_string()).or_else(|| {
                        // Fall back to the file stem when the referenced
                        // project is outside the solution (degraded later).
                        path.file_stem().map(|s| s.to_string_lossy().to_string())
                    })
                })
                .collect();
            (p.name.clone(), refs)
        })
        .collect()
}

/// Kahn's algorithm over project references; ties broken by declaration
/// order in the manifest so the result is deterministic.
fn topological_order(parsed: &[ParsedProject]) -> Result<Vec<usize>> {
    let refs = reference_names(parsed);
    let index_of: AHashMap<&str, usize> = parsed
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; parsed.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); parsed.len()];
    for (i, p) in parsed.iter().enumerate() {
        for dep in refs.get(&p.name).into_iter().flatten() {
            if let Some(&j) = index_of.get(dep.as_str()) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..parsed.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(parsed.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &dep in &dependents[i] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                ready.push_back(dep);
            }
        }
    }

    if order.len() != parsed.len() {
        let stuck: Vec<&str> = (0..parsed.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| parsed[i].name.as_str())
            .collect();
        return Err(EngineError::DependencyCycle {
            chain: stuck.join(" -> "),
        });
    }
    Ok(order)
}

/// Finalize projects dependency-first so each content hash can fold in the
/// hashes of its dependencies.
fn finalize_in_order(parsed: &[ParsedProject], order: &[usize]) -> Vec<ProjectInfo> {
    let refs = reference_names(parsed);
    let mut hash_by_name: AHashMap<String, String> = AHashMap::new();
    let mut out: Vec<ProjectInfo> = Vec::with_capacity(parsed.len());

    for &i in order {
        let p = &parsed[i];
        let names = refs.get(&p.name).cloned().unwrap_or_default();
        let dep_hashes: Vec<String> = names
            .iter()
            .filter_map(|n| hash_by_name.get(n).cloned())
            .collect();
        let info = project::finalize_project(p, names, &dep_hashes);
        hash_by_name.insert(info.name.clone(), info.content_hash.clone());
        out.push(info);
    }
    out
}
