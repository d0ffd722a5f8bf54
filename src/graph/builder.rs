//! Full-mode call graph builder
//!
//! Builds the complete forward/reverse graph for a solution: projects in
//! topological order, files within a project in parallel, declarations
//! registered before edges so callees resolve to declared nodes instead of
//! stubs wherever a declaration exists. Given identical inputs the produced
//! graph is byte-identical once serialized.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::compilation::{Compilation, SemanticModel};
use crate::error::{EngineError, Result, Warning, WarningCategory};
use crate::graph::model::{MethodCallGraph, MethodInfo};
use crate::graph::visitor::{self, FileVisit};
use crate::symbols::id::MethodId;
use crate::syntax;
use crate::workspace::Workspace;

/// Options controlling graph construction
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Restrict the build to these projects (empty = all)
    pub projects: Vec<String>,

    /// Record edges to known implementations of interface/virtual targets
    pub inclusive_dispatch: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            inclusive_dispatch: false,
        }
    }
}

/// Statistics from a full build
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BuildStats {
    pub projects_analyzed: usize,
    pub projects_degraded: usize,
    pub files_visited: usize,
    pub methods_registered: usize,
    pub edges_added: usize,
    pub unresolved_calls: usize,
    pub build_ms: u64,
}

/// Result of a full build: the graph plus warnings gathered along the way
pub struct BuildOutcome {
    pub graph: MethodCallGraph,
    pub stats: BuildStats,
    pub warnings: Vec<Warning>,
}

/// Build the complete call graph for the workspace's solution
pub fn build_full(
    workspace: &Workspace,
    options: &GraphOptions,
    cancel: &CancelToken,
) -> Result<BuildOutcome> {
    let started = Instant::now();
    let mut graph = MethodCallGraph::new();
    let mut stats = BuildStats::default();
    let mut warnings = Vec::new();

    let selected: Vec<String> = workspace
        .solution()
        .projects
        .iter()
        .filter(|p| options.projects.is_empty() || options.projects.contains(&p.name))
        .map(|p| p.name.clone())
        .collect();

    for project in &selected {
        cancel.check()?;
        let compilation = match workspace.compilation(project, cancel) {
            Ok(c) => c,
            Err(EngineError::Canceled) => return Err(EngineError::Canceled),
            Err(e) => {
                warn!(project, %e, "skipping project in call graph");
                warnings.push(Warning::new(WarningCategory::Compilation, e.to_string()));
                stats.projects_degraded += 1;
                continue;
            }
        };
        let deps = workspace.dependency_compilations(project);
        let dep_refs: Vec<&Compilation> = deps.iter().map(std::convert::AsRef::as_ref).collect();

        // Declarations first so edges find declared targets
        register_declarations(&compilation, &mut graph);

        let visits: Vec<FileVisit> = (0..compilation.files.len())
            .into_par_iter()
            .map(|idx| {
                if cancel.is_canceled() {
                    return FileVisit::default();
                }
                let model = SemanticModel {
                    file: &compilation.files[idx],
                    decls: &compilation.decls[idx],
                    compilation: &compilation,
                    dependencies: dep_refs.clone(),
                };
                visitor::visit_file(&model, options.inclusive_dispatch)
            })
            .collect();
        cancel.check()?;

        // Merge in file order so edge insertion order is deterministic
        for visit in visits {
            stats.files_visited += 1;
            stats.unresolved_calls += visit.unresolved;
            for method in visit.methods {
                let caller = method.info.id.clone();
                graph.register(method.info);
                for call in method.calls {
                    graph.add_edge(caller.clone(), call.id, call.kind);
                }
            }
        }
        stats.projects_analyzed += 1;
    }

    graph.verify_transpose()?;
    warnings.extend(workspace.take_warnings());

    stats.methods_registered = graph.node_count();
    stats.edges_added = graph.edge_count();
    stats.build_ms = started.elapsed().as_millis() as u64;
    debug!(
        nodes = stats.methods_registered,
        edges = stats.edges_added,
        unresolved = stats.unresolved_calls,
        "call graph built"
    );

    Ok(BuildOutcome {
        graph,
        stats,
        warnings,
    })
}

/// Register every declared method and property accessor of a compilation
pub fn register_declarations(compilation: &Compilation, graph: &mut MethodCallGraph) {
    for (file_idx, file) in compilation.decls.iter().enumerate() {
        let path = &compilation.files[file_idx].path;
        for ty in &file.types {
            let fqn = ty.fqn();
            for method in &ty.methods {
                let name = syntax::with_arity(
                    method.name.split('`').next().unwrap_or(&method.name),
                    method.generic_arity,
                );
                let id = MethodId::new(
                    fqn.clone(),
                    name,
                    method.params.iter().map(|p| p.ty.clone()).collect(),
                );
                graph.register(MethodInfo::declared(id, path.clone(), method.start_line));
            }
            for property in &ty.properties {
                if property.has_getter {
                    graph.register(MethodInfo::declared(
                        MethodId::getter(fqn.clone(), &property.name),
                        path.clone(),
                        property.start_line,
                    ));
                }
                if property.has_setter {
                    graph.register(MethodInfo::declared(
                        MethodId::setter(fqn.clone(), &property.name, &property.ty),
                        path.clone(),
                        property.start_line,
                    ));
                }
            }
        }
    }
}
