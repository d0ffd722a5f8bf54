//! Lightweight symbol index
//!
//! A lexical pre-scan over every source file of every project, mapping
//! fully-qualified type names, method names, and file paths to the projects
//! that declare them. No semantic compilation happens here; the pass is
//! line-oriented regex matching and completes in time proportional to total
//! source bytes.
//!
//! Lookups return candidate sets: they never miss a declared name within the
//! solution but may over-approximate. Callers filter candidates with the
//! semantic model.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::project::ProjectInfo;
use crate::solution::Solution;

static NAMESPACE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*namespace\s+([\w.]+)").unwrap());
static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct|record|interface|enum)\s+(\w+)").unwrap()
});
static METHOD_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:\[[^\]]*\]\s*)*(?:(?:public|private|protected|internal|static|virtual|override|async|sealed|abstract|partial|new|extern)\s+)+[\w.<>\[\],?\s]+?\b(\w+)\s*(?:<[^>()]*>)?\s*\(",
    )
    .unwrap()
});
static NAME_BEFORE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\w+)\s*\(").unwrap());

/// One file's lexical scan output
#[derive(Debug, Default)]
struct FileScan {
    /// Fully-qualified type names declared here
    types: Vec<String>,
    /// `Type.Method` pairs declared here (candidate-quality)
    methods: Vec<String>,
    /// Every identifier followed by `(`, declaration or call
    simple_names: Vec<String>,
}

/// Fast declaration lookup built once per solution
#[derive(Debug, Default)]
pub struct SymbolIndex {
    type_to_projects: AHashMap<String, Vec<String>>,
    method_to_projects: AHashMap<String, Vec<String>>,
    simple_name_to_files: AHashMap<String, Vec<PathBuf>>,
    file_to_project: AHashMap<PathBuf, String>,
}

impl SymbolIndex {
    /// Scan every source file of every project.
    ///
    /// Files are scanned in parallel; results merge in the solution's
    /// deterministic project order so candidate lists are stable.
    pub fn build(solution: &Solution) -> Self {
        let mut index = Self::default();
        for project in &solution.projects {
            index.add_project(project);
        }
        index
    }

    /// Index one project's sources (also used when a project is added)
    pub fn add_project(&mut self, project: &ProjectInfo) {
        let scans: Vec<(PathBuf, FileScan)> = project
            .sources
            .par_iter()
            .map(|path| {
                let source = fs::read_to_string(path).unwrap_or_default();
                (path.clone(), scan_file(&source))
            })
            .collect();

        for (path, scan) in scans {
            self.file_to_project
                .insert(path.clone(), project.name.clone());
            for ty in scan.types {
                push_unique(
                    self.type_to_projects.entry(ty).or_default(),
                    &project.name,
                );
            }
            for method in scan.methods {
                push_unique(
                    self.method_to_projects.entry(method).or_default(),
                    &project.name,
                );
            }
            for name in scan.simple_names {
                let files = self.simple_name_to_files.entry(name).or_default();
                if !files.contains(&path) {
                    files.push(path.clone());
                }
            }
        }
    }

    /// Candidate projects declaring a type (by fqn or simple name)
    pub fn projects_for_type(&self, fqn: &str) -> Vec<&str> {
        let direct = self
            .type_to_projects
            .get(fqn)
            .map(|v| v.iter().map(String::as_str).collect::<Vec<_>>());
        match direct {
            Some(v) if !v.is_empty() => v,
            _ => {
                // Simple-name fallback keeps the no-false-negative contract
                // when the caller only has an unqualified name.
                let simple = fqn.rsplit('.').next().unwrap_or(fqn);
                self.type_to_projects
                    .iter()
                    .filter(|(k, _)| k.rsplit('.').next() == Some(simple))
                    .flat_map(|(_, v)| v.iter().map(String::as_str))
                    .collect()
            }
        }
    }

    /// Candidate projects declaring a method (`Ns.Type.Method` or `Type.Method`)
    pub fn projects_for_method(&self, fqn: &str) -> Vec<&str> {
        if let Some(v) = self.method_to_projects.get(fqn) {
            return v.iter().map(String::as_str).collect();
        }
        // Fall back to the declaring type's candidates
        match fqn.rfind('.') {
            Some(idx) => self.projects_for_type(&fqn[..idx]),
            None => Vec::new(),
        }
    }

    /// Files whose text mentions a method simple name (declaration or call)
    pub fn files_containing_simple_name(&self, name: &str) -> Vec<&Path> {
        self.simple_name_to_files
            .get(name)
            .map(|v| v.iter().map(PathBuf::as_path).collect())
            .unwrap_or_default()
    }

    /// The project that owns a source file
    pub fn project_for_file(&self, path: &Path) -> Option<&str> {
        self.file_to_project.get(path).map(String::as_str)
    }

    /// Number of indexed files
    pub fn file_count(&self) -> usize {
        self.file_to_project.len()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Line-oriented lexical scan of one source file
fn scan_file(source: &str) -> FileScan {
    let mut scan = FileScan::default();
    let mut namespace = String::new();
    let mut current_type = String::new();

    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") {
            continue;
        }

        if let Some(cap) = NAMESPACE_DECL.captures(line) {
            namespace = cap[1].to_string();
        }

        if let Some(cap) = TYPE_DECL.captures(line) {
            let fqn = if namespace.is_empty() {
                cap[1].to_string()
            } else {
                format!("{}.{}", &namespace, &cap[1])
            };
            current_type = fqn.clone();
            scan.types.push(fqn);
        }

        if let Some(cap) = METHOD_DECL.captures(line) {
            if !current_type.is_empty() {
                scan.methods.push(format!("{}.{}", current_type, &cap[1]));
            }
        }

        for cap in NAME_BEFORE_PAREN.captures_iter(line) {
            scan.simple_names.push(cap[1].to_string());
        }
    }
    scan
}
