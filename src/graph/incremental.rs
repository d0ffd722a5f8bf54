//! Incremental call graph builder
//!
//! Breadth-first expansion from seed methods up to a depth bound, loading
//! only the projects the traversal actually touches. The resulting focused
//! subgraph contains exactly the visited nodes and every edge between them,
//! so it equals the induced subgraph of the full-mode graph on the same node
//! set.

use std::collections::VecDeque;
use std::path::PathBuf;

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::compilation::{Compilation, SemanticModel};
use crate::error::Result;
use crate::graph::model::{CallEdgeKind, MethodCallGraph, MethodInfo};
use crate::graph::visitor::{self, VisitedMethod};
use crate::symbols::id::MethodId;
use crate::syntax;
use crate::workspace::Workspace;

/// Direction of the breadth-first expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseDirection {
    Forward,
    Reverse,
}

/// Options for a focused expansion
pub struct IncrementalOptions {
    /// Depth bound for the expansion
    pub max_depth: usize,

    pub direction: TraverseDirection,

    pub inclusive_dispatch: bool,

    /// Expansion stops at nodes for which this returns true
    pub terminate: Option<Box<dyn Fn(&MethodId) -> bool + Send + Sync>>,
}

impl Default for IncrementalOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            direction: TraverseDirection::Forward,
            inclusive_dispatch: false,
            terminate: None,
        }
    }
}

/// Lazily-expanding graph explorer over a workspace.
///
/// File visits are memoized so repeated expansions touching the same files
/// reuse earlier work; projects load on first touch only.
pub struct IncrementalBuilder<'w> {
    workspace: &'w Workspace,
    inclusive_dispatch: bool,
    file_visits: AHashMap<PathBuf, Vec<VisitedMethod>>,
    cancel: CancelToken,
}

impl<'w> IncrementalBuilder<'w> {
    pub fn new(workspace: &'w Workspace, cancel: CancelToken) -> Self {
        Self {
            workspace,
            inclusive_dispatch: false,
            file_visits: AHashMap::new(),
            cancel,
        }
    }

    pub fn with_inclusive_dispatch(mut self, enabled: bool) -> Self {
        self.inclusive_dispatch = enabled;
        self
    }

    /// Build the focused subgraph reachable from the seeds
    pub fn build(
        &mut self,
        seeds: &[MethodId],
        options: &IncrementalOptions,
    ) -> Result<MethodCallGraph> {
        self.inclusive_dispatch = options.inclusive_dispatch;

        // Phase 1: collect the visited node set by BFS
        let mut visited: AHashSet<MethodId> = AHashSet::new();
        let mut frontier: VecDeque<(MethodId, usize)> = VecDeque::new();

        let mut sorted_seeds: Vec<&MethodId> = seeds.iter().collect();
        sorted_seeds.sort();
        for seed in sorted_seeds {
            if visited.insert(seed.clone()) {
                frontier.push_back((seed.clone(), 0));
            }
        }

        while let Some((current, depth)) = frontier.pop_front() {
            self.cancel.check()?;
            if depth >= options.max_depth {
                continue;
            }
            if let Some(terminate) = &options.terminate {
                if terminate(&current) {
                    continue;
                }
            }

            let mut neighbors: Vec<MethodId> = match options.direction {
                TraverseDirection::Forward => self
                    .outbound(&current)?
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect(),
                TraverseDirection::Reverse => self
                    .inbound(&current)?
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect(),
            };
            // Sorted expansion keeps canonical paths on the smaller ids
            neighbors.sort();
            for neighbor in neighbors {
                if visited.insert(neighbor.clone()) {
                    frontier.push_back((neighbor, depth + 1));
                }
            }
        }

        // Phase 2: register every visited node and every edge between
        // visited nodes, including edges among nodes at the depth bound.
        let mut graph = MethodCallGraph::new();
        let mut sorted: Vec<MethodId> = visited.iter().cloned().collect();
        sorted.sort();
        for id in &sorted {
            let info = self.info_for(id)?;
            graph.register(info);
        }
        for id in &sorted {
            self.cancel.check()?;
            for (callee, kind) in self.outbound(id)? {
                if visited.contains(&callee) {
                    graph.add_edge(id.clone(), callee, kind);
                }
            }
        }

        graph.verify_transpose()?;
        debug!(
            seeds = seeds.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "incremental subgraph built"
        );
        Ok(graph)
    }

    /// Outbound edges of one method, loading only its declaring project
    pub fn outbound(&mut self, id: &MethodId) -> Result<Vec<(MethodId, CallEdgeKind)>> {
        let visited = self.visit_declaring_file(id)?;
        Ok(visited
            .map(|m| {
                m.calls
                    .iter()
                    .map(|c| (c.id.clone(), c.kind))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    /// Inbound edges: callers found through the symbol index candidates
    pub fn inbound(&mut self, id: &MethodId) -> Result<Vec<(MethodId, CallEdgeKind)>> {
        let simple = id.simple_name().to_string();
        let candidates: Vec<PathBuf> = self
            .workspace
            .symbol_index()
            .files_containing_simple_name(&simple)
            .into_iter()
            .map(|p| p.to_path_buf())
            .collect();

        let mut callers: Vec<(MethodId, CallEdgeKind)> = Vec::new();
        for file in candidates {
            self.cancel.check()?;
            if self.ensure_file_visited(&file).is_err() {
                continue;
            }
            if let Some(methods) = self.file_visits.get(&file) {
                for method in methods {
                    for call in &method.calls {
                        if &call.id == id {
                            callers.push((method.info.id.clone(), call.kind));
                        }
                    }
                }
            }
        }
        callers.sort_by(|a, b| a.0.cmp(&b.0));
        callers.dedup_by(|a, b| a.0 == b.0);
        Ok(callers)
    }

    /// Declaration metadata for a node, preferring visited declarations
    fn info_for(&mut self, id: &MethodId) -> Result<MethodInfo> {
        if let Some(info) = self
            .visit_declaring_file(id)?
            .map(|m| m.info.clone())
        {
            return Ok(info);
        }
        // Bodyless declarations (interface members, auto-properties) still
        // resolve to declared info through the compilation tables.
        if let Some(compilation) = self.compilation_declaring(&id.type_fqn)? {
            if let Some(decl) = compilation.type_decl(&id.type_fqn) {
                let file = compilation
                    .file_of_type(&id.type_fqn)
                    .map(|p| p.to_path_buf());
                let simple = id.simple_name();
                if let Some(method) = decl
                    .methods
                    .iter()
                    .find(|m| m.name.split('`').next() == Some(simple) || m.name == id.method)
                {
                    if let Some(file) = file {
                        return Ok(MethodInfo::declared(id.clone(), file, method.start_line));
                    }
                }
                if let Some(property) = decl.properties.iter().find(|p| p.name == simple) {
                    if let Some(file) = compilation.file_of_type(&id.type_fqn) {
                        return Ok(MethodInfo::declared(
                            id.clone(),
                            file.to_path_buf(),
                            property.start_line,
                        ));
                    }
                }
            }
        }
        Ok(MethodInfo::external(id.clone()))
    }

    /// Visit the file declaring `id`'s type, returning its visit record
    fn visit_declaring_file(&mut self, id: &MethodId) -> Result<Option<&VisitedMethod>> {
        let file = match self.declaring_file(&id.type_fqn)? {
            Some(f) => f,
            None => return Ok(None),
        };
        self.ensure_file_visited(&file)?;
        Ok(self
            .file_visits
            .get(&file)
            .and_then(|methods| methods.iter().find(|m| &m.info.id == id)))
    }

    fn declaring_file(&mut self, type_fqn: &str) -> Result<Option<PathBuf>> {
        if let Some(compilation) = self.compilation_declaring(type_fqn)? {
            return Ok(compilation.file_of_type(type_fqn).map(|p| p.to_path_buf()));
        }
        Ok(None)
    }

    /// Compilation of the project declaring a type, loading it on demand
    fn compilation_declaring(
        &mut self,
        type_fqn: &str,
    ) -> Result<Option<std::sync::Arc<Compilation>>> {
        let candidates: Vec<String> = self
            .workspace
            .symbol_index()
            .projects_for_type(type_fqn)
            .into_iter()
            .map(String::from)
            .collect();
        for project in candidates {
            let compilation = match self.workspace.compilation(&project, &self.cancel) {
                Ok(c) => c,
                Err(crate::error::EngineError::Canceled) => {
                    return Err(crate::error::EngineError::Canceled)
                }
                Err(_) => continue,
            };
            if compilation.type_decl(type_fqn).is_some() {
                return Ok(Some(compilation));
            }
        }
        Ok(None)
    }

    fn ensure_file_visited(&mut self, file: &PathBuf) -> Result<()> {
        if self.file_visits.contains_key(file) {
            return Ok(());
        }
        let project = self.workspace.project_for_file(file)?.name.clone();
        let compilation = self.workspace.compilation(&project, &self.cancel)?;
        let deps = self.workspace.dependency_compilations(&project);
        let dep_refs: Vec<&Compilation> = deps.iter().map(std::convert::AsRef::as_ref).collect();

        let methods = match compilation.file_index(file) {
            Some(idx) => {
                let model = SemanticModel {
                    file: &compilation.files[idx],
                    decls: &compilation.decls[idx],
                    compilation: &compilation,
                    dependencies: dep_refs,
                };
                let mut visit = visitor::visit_file(&model, self.inclusive_dispatch);
                // Bodyless accessors still need declared nodes for callers
                let mut all = Vec::new();
                for ty in &compilation.decls[idx].types {
                    let fqn = ty.fqn();
                    for property in &ty.properties {
                        if property.has_getter {
                            let gid = MethodId::getter(fqn.clone(), &property.name);
                            if !visit.methods.iter().any(|m| m.info.id == gid) {
                                all.push(VisitedMethod {
                                    info: MethodInfo::declared(
                                        gid,
                                        file.clone(),
                                        property.start_line,
                                    ),
                                    calls: Vec::new(),
                                });
                            }
                        }
                        if property.has_setter {
                            let sid = MethodId::setter(fqn.clone(), &property.name, &property.ty);
                            if !visit.methods.iter().any(|m| m.info.id == sid) {
                                all.push(VisitedMethod {
                                    info: MethodInfo::declared(
                                        sid,
                                        file.clone(),
                                        property.start_line,
                                    ),
                                    calls: Vec::new(),
                                });
                            }
                        }
                    }
                    for method in &ty.methods {
                        let id = MethodId::new(
                            fqn.clone(),
                            syntax::with_arity(
                                method.name.split('`').next().unwrap_or(&method.name),
                                method.generic_arity,
                            ),
                            method.params.iter().map(|p| p.ty.clone()).collect(),
                        );
                        if !visit.methods.iter().any(|m| m.info.id == id) {
                            all.push(VisitedMethod {
                                info: MethodInfo::declared(id, file.clone(), method.start_line),
                                calls: Vec::new(),
                            });
                        }
                    }
                }
                visit.methods.extend(all);
                visit.methods
            }
            None => Vec::new(),
        };
        self.file_visits.insert(file.clone(), methods);
        Ok(())
    }
}
