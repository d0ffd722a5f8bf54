//! Project files and metadata
//!
//! Parses `.csproj` files with a lightweight lexical pass (no XML object
//! model is needed for the handful of elements the engine reads) and derives
//! the `ProjectInfo` record: sources, references, key properties, the
//! deterministic content hash that namespaces every cached artifact, and the
//! test-project classification.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::hashing::{fnv1a_bytes, fnv1a_hash};

/// Tag mixed into every content hash; bumping it invalidates all caches at
/// once, which is how a compiler/schema upgrade is propagated.
pub const COMPILER_VERSION_TAG: &str = concat!("testmap-", env!("CARGO_PKG_VERSION"));

static PROJECT_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<ProjectReference\s+[^>]*Include\s*=\s*"([^"]+)""#).unwrap()
});
static PACKAGE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<PackageReference\s+[^>]*Include\s*=\s*"([^"]+)""#).unwrap()
});
static ASSEMBLY_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<Reference\s+[^>]*Include\s*=\s*"([^"]+)""#).unwrap());
static SIMPLE_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(\w+)>([^<]*)</(\w+)>").unwrap());

/// Package name fragments that mark a project as test infrastructure
const TEST_PACKAGE_MARKERS: &[&str] = &[
    "xunit",
    "nunit",
    "mstest.testframework",
    "microsoft.net.test.sdk",
];

/// Name suffixes conventionally used for test projects
const TEST_NAME_SUFFIXES: &[&str] = &[".tests", ".test", ".unittests", ".integrationtests", ".spec"];

/// A compilation unit discovered from the solution manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name as declared in the solution
    pub name: String,

    /// Absolute path to the project file
    pub path: PathBuf,

    /// Target framework moniker, e.g. `net8.0`
    pub target_framework: String,

    /// Source files in deterministic (sorted) order
    pub sources: Vec<PathBuf>,

    /// Names of referenced projects (resolved from ProjectReference paths)
    pub project_references: Vec<String>,

    /// NuGet package references
    pub package_references: Vec<String>,

    /// Plain assembly references
    pub assembly_references: Vec<String>,

    /// Selected MSBuild properties, insertion-ordered
    pub properties: Vec<(String, String)>,

    /// Deterministic hash over project file bytes + sorted dependency hashes
    /// + compiler version tag
    pub content_hash: String,

    /// Whether this project is classified as a test project
    pub is_test_project: bool,
}

impl ProjectInfo {
    /// Directory containing the project file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Whether a package reference matches a marker fragment
    pub fn references_package(&self, fragment: &str) -> bool {
        let fragment = fragment.to_ascii_lowercase();
        self.package_references
            .iter()
            .any(|p| p.to_ascii_lowercase().contains(&fragment))
    }

    /// A property value by name
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw parse of a project file, before dependency hashes are available
#[derive(Debug, Clone)]
pub struct ParsedProject {
    pub name: String,
    pub path: PathBuf,
    pub target_framework: String,
    pub project_reference_paths: Vec<PathBuf>,
    pub package_references: Vec<String>,
    pub assembly_references: Vec<String>,
    pub properties: Vec<(String, String)>,
    pub file_hash: u64,
}

/// Parse a `.csproj` file
pub fn parse_project_file(name: &str, path: &Path) -> Result<ParsedProject> {
    let bytes = fs::read(path).map_err(|_| EngineError::ProjectMissing {
        path: path.display().to_string(),
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let dir = path.parent().unwrap_or(Path::new("."));

    let mut properties = Vec::new();
    for cap in SIMPLE_PROPERTY.captures_iter(&content) {
        if cap[1] == cap[3] {
            properties.push((cap[1].to_string(), cap[2].trim().to_string()));
        }
    }

    let target_framework = properties
        .iter()
        .find(|(k, _)| k == "TargetFramework" || k == "TargetFrameworks")
        .map(|(_, v)| v.split(';').next().unwrap_or(v).to_string())
        .unwrap_or_else(|| "net8.0".to_string());

    let project_reference_paths = PROJECT_REFERENCE
        .captures_iter(&content)
        .map(|cap| resolve_manifest_path(dir, &cap[1]))
        .collect();

    let package_references = PACKAGE_REFERENCE
        .captures_iter(&content)
        .map(|cap| cap[1].to_string())
        .collect();

    let assembly_references = ASSEMBLY_REFERENCE
        .captures_iter(&content)
        .map(|cap| cap[1].to_string())
        .collect();

    Ok(ParsedProject {
        name: name.to_string(),
        path: path.to_path_buf(),
        target_framework,
        project_reference_paths,
        package_references,
        assembly_references,
        properties,
        file_hash: fnv1a_bytes(&bytes),
    })
}

/// Resolve a path as written in a manifest (backslash separators) against a base directory
pub fn resolve_manifest_path(base: &Path, raw: &str) -> PathBuf {
    let normalized = raw.replace('\\', "/");
    let joined = base.join(normalized);
    // Collapse `..` components without touching the filesystem
    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Enumerate SDK-style implicit sources: every `.cs` under the project
/// directory except `bin/` and `obj/`, sorted for determinism.
pub fn enumerate_sources(project_dir: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = ignore::WalkBuilder::new(project_dir)
        .hidden(false)
        .git_ignore(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension().map(|e| e == "cs").unwrap_or(false)
                && !path.components().any(|c| {
                    let s = c.as_os_str();
                    s == "bin" || s == "obj"
                })
        })
        .collect();
    sources.sort();
    sources
}

/// Finalize a parsed project into `ProjectInfo` once the content hashes of
/// its dependencies are known (the solution computes these in topological
/// order).
pub fn finalize_project(
    parsed: &ParsedProject,
    reference_names: Vec<String>,
    dependency_hashes: &[String],
) -> ProjectInfo {
    let sources = enumerate_sources(parsed.path.parent().unwrap_or(Path::new(".")));

    let mut sorted_deps: Vec<&String> = dependency_hashes.iter().collect();
    sorted_deps.sort();
    let mut hash_input = format!("{:016x}", parsed.file_hash);
    for dep in sorted_deps {
        hash_input.push(':');
        hash_input.push_str(dep);
    }
    hash_input.push(':');
    hash_input.push_str(COMPILER_VERSION_TAG);
    let content_hash = format!("{:016x}", fnv1a_hash(&hash_input));

    let is_test_project = classify_test_project(parsed);

    ProjectInfo {
        name: parsed.name.clone(),
        path: parsed.path.clone(),
        target_framework: parsed.target_framework.clone(),
        sources,
        project_references: reference_names,
        package_references: parsed.package_references.clone(),
        assembly_references: parsed.assembly_references.clone(),
        properties: parsed.properties.clone(),
        content_hash,
        is_test_project,
    }
}

/// Test-project classification: explicit `IsTestProject`, test framework
/// package references, or conventional name suffixes.
pub fn classify_test_project(parsed: &ParsedProject) -> bool {
    if let Some((_, v)) = parsed
        .properties
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("IsTestProject"))
    {
        return v.eq_ignore_ascii_case("true");
    }

    let has_test_package = parsed.package_references.iter().any(|p| {
        let lower = p.to_ascii_lowercase();
        TEST_PACKAGE_MARKERS.iter().any(|m| lower.contains(m))
    });
    if has_test_package {
        return true;
    }

    let lower = parsed.name.to_ascii_lowercase();
    TEST_NAME_SUFFIXES.iter().any(|s| lower.ends_with(s))
}
