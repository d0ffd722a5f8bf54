//! Per-project compilations
//!
//! A `Compilation` bundles one project's parsed syntax trees with the
//! declaration tables extracted from them: the type table keyed by
//! fully-qualified name and a simple-name lookup used when resolving
//! unqualified references through `using` directives. Compilations of
//! referenced projects form a DAG mirroring the project references; the
//! workspace loads prerequisites first so cross-project resolution is
//! deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use rayon::prelude::*;
use tracing::debug;
use tree_sitter::Tree;

use crate::error::{EngineError, Result};
use crate::project::ProjectInfo;
use crate::syntax::{self, FileDecls, MethodDecl, PropertyDecl, TypeDecl};

/// One parsed source file retained by a compilation
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

/// The semantic model bundle for one project
pub struct Compilation {
    /// Project name
    pub project: String,

    /// Parsed files in deterministic (sorted-path) order
    pub files: Vec<SourceFile>,

    /// Declaration tables, parallel to `files`
    pub decls: Vec<FileDecls>,

    /// Type fqn -> (file index, type index within file)
    types: AHashMap<String, (usize, usize)>,

    /// Simple type name (arity-stripped) -> fqns declared in this project
    simple_types: AHashMap<String, Vec<String>>,
}

impl Compilation {
    /// Parse every source of a project and build its declaration tables.
    ///
    /// Files parse in parallel; a file that fails to read or parse degrades
    /// to a warning-level skip rather than poisoning the project.
    pub fn build(project: &ProjectInfo) -> Result<Self> {
        let mut parsed: Vec<(PathBuf, String, Tree)> = project
            .sources
            .par_iter()
            .filter_map(|path| {
                let source = fs::read_to_string(path).ok()?;
                let tree = syntax::parse_source(path, &source).ok()?;
                Some((path.clone(), source, tree))
            })
            .collect();
        parsed.sort_by(|a, b| a.0.cmp(&b.0));

        if parsed.is_empty() && !project.sources.is_empty() {
            return Err(EngineError::Compilation {
                project: project.name.clone(),
                message: "no source file could be parsed".to_string(),
            });
        }

        let mut files = Vec::with_capacity(parsed.len());
        let mut decls = Vec::with_capacity(parsed.len());
        for (path, source, tree) in parsed {
            let file_decls = syntax::extract_file_decls(&path, &source, &tree);
            files.push(SourceFile { path, source, tree });
            decls.push(file_decls);
        }

        let mut types = AHashMap::new();
        let mut simple_types: AHashMap<String, Vec<String>> = AHashMap::new();
        for (file_idx, file_decls) in decls.iter().enumerate() {
            for (type_idx, ty) in file_decls.types.iter().enumerate() {
                let fqn = ty.fqn();
                types.entry(fqn.clone()).or_insert((file_idx, type_idx));
                let simple = ty.name.split('`').next().unwrap_or(&ty.name).to_string();
                let entry = simple_types.entry(simple).or_default();
                if !entry.contains(&fqn) {
                    entry.push(fqn);
                }
            }
        }

        debug!(
            project = %project.name,
            files = files.len(),
            types = types.len(),
            "compilation built"
        );

        Ok(Self {
            project: project.name.clone(),
            files,
            decls,
            types,
            simple_types,
        })
    }

    /// Look up a type declaration by fully-qualified name
    pub fn type_decl(&self, fqn: &str) -> Option<&TypeDecl> {
        let &(file_idx, type_idx) = self.types.get(fqn)?;
        self.decls.get(file_idx)?.types.get(type_idx)
    }

    /// File declaring a type
    pub fn file_of_type(&self, fqn: &str) -> Option<&Path> {
        let &(file_idx, _) = self.types.get(fqn)?;
        Some(&self.decls[file_idx].path)
    }

    /// Fqns matching a simple (arity-stripped) type name
    pub fn types_named(&self, simple: &str) -> &[String] {
        self.simple_types
            .get(simple)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All declared types, in declaration order
    pub fn all_types(&self) -> impl Iterator<Item = (String, &TypeDecl)> {
        self.decls
            .iter()
            .flat_map(|file| file.types.iter().map(|ty| (ty.fqn(), ty)))
    }

    /// Methods of a type by simple method name
    pub fn methods_named<'a>(&'a self, fqn: &str, name: &str) -> Vec<&'a MethodDecl> {
        self.type_decl(fqn)
            .map(|ty| {
                ty.methods
                    .iter()
                    .filter(|m| m.name.split('`').next() == Some(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Property of a type by name
    pub fn property_named<'a>(&'a self, fqn: &str, name: &str) -> Option<&'a PropertyDecl> {
        self.type_decl(fqn)?
            .properties
            .iter()
            .find(|p| p.name == name)
    }

    /// Index of a file within the compilation
    pub fn file_index(&self, path: &Path) -> Option<usize> {
        self.files.iter().position(|f| f.path == path)
    }
}

/// A semantic model: one file viewed against its project's compilation and
/// the compilations of referenced projects.
pub struct SemanticModel<'a> {
    pub file: &'a SourceFile,
    pub decls: &'a FileDecls,
    pub compilation: &'a Compilation,
    /// Dependency compilations, topological (dependency-first) order
    pub dependencies: Vec<&'a Compilation>,
}

impl<'a> SemanticModel<'a> {
    /// Find a type by fqn in this project first, then dependencies
    pub fn find_type(&self, fqn: &str) -> Option<(&'a Compilation, &'a TypeDecl)> {
        if let Some(ty) = self.compilation.type_decl(fqn) {
            return Some((self.compilation, ty));
        }
        for dep in &self.dependencies {
            if let Some(ty) = dep.type_decl(fqn) {
                return Some((dep, ty));
            }
        }
        None
    }

    /// Resolve a simple type name through the file's namespace and usings.
    ///
    /// Candidates are checked in C# lookup order: the declaring namespace
    /// (innermost first), then each `using` directive in source order.
    pub fn resolve_type_name(&self, simple: &str, namespace: &str) -> Option<String> {
        let simple = simple.split('`').next().unwrap_or(simple);

        // Same-namespace lookup, walking outward
        let mut ns = namespace.to_string();
        loop {
            let candidate = if ns.is_empty() {
                simple.to_string()
            } else {
                format!("{}.{}", ns, simple)
            };
            if self.fqn_exists(&candidate) {
                return Some(candidate);
            }
            match ns.rfind('.') {
                Some(idx) => ns.truncate(idx),
                None if !ns.is_empty() => ns.clear(),
                None => break,
            }
        }

        // Using directives in source order
        for using in &self.decls.usings {
            let candidate = format!("{}.{}", using, simple);
            if self.fqn_exists(&candidate) {
                return Some(candidate);
            }
        }

        // Last resort: a unique simple-name match anywhere in scope
        let mut matches: Vec<String> = Vec::new();
        for fqn in self.compilation.types_named(simple) {
            if !matches.contains(fqn) {
                matches.push(fqn.clone());
            }
        }
        for dep in &self.dependencies {
            for fqn in dep.types_named(simple) {
                if !matches.contains(fqn) {
                    matches.push(fqn.clone());
                }
            }
        }
        if matches.len() == 1 {
            return matches.pop();
        }
        None
    }

    fn fqn_exists(&self, fqn: &str) -> bool {
        // Arity-suffixed declarations also answer for the bare name:
        // `App.Repository` matches a declared ``App.Repository`1``
        if self.compilation.type_decl(fqn).is_some()
            || self.dependencies.iter().any(|d| d.type_decl(fqn).is_some())
        {
            return true;
        }
        let arity_prefix = format!("{}`", fqn);
        let simple = fqn.rsplit('.').next().unwrap_or(fqn);
        self.compilation
            .types_named(simple)
            .iter()
            .chain(
                self.dependencies
                    .iter()
                    .flat_map(|d| d.types_named(simple).iter()),
            )
            .any(|candidate| candidate.starts_with(&arity_prefix))
    }

    /// Full fqn (with arity suffix if declared generic) for a resolved name
    pub fn canonical_fqn(&self, fqn: &str) -> String {
        if self.find_type(fqn).is_some() {
            return fqn.to_string();
        }
        let arity_prefix = format!("{}`", fqn);
        let simple = fqn.rsplit('.').next().unwrap_or(fqn);
        let candidate = self
            .compilation
            .types_named(simple)
            .iter()
            .chain(
                self.dependencies
                    .iter()
                    .flat_map(|d| d.types_named(simple).iter()),
            )
            .find(|c| c.starts_with(&arity_prefix));
        candidate.cloned().unwrap_or_else(|| fqn.to_string())
    }
}
