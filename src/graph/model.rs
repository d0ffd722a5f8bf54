//! Call graph data model
//!
//! Forward and reverse adjacency keyed by value-typed `MethodId`s. There are
//! no ownership cycles: callers and callees reference each other by id only.
//! Once returned to a caller the graph is immutable; concurrent readers need
//! no locking.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::symbols::id::MethodId;

/// Kind of call edge emitted by the method call visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEdgeKind {
    DirectCall,
    Constructor,
    PropertyGetter,
    PropertySetter,
    ExtensionMethod,
    InterfaceCall,
    VirtualCall,
    StaticCall,
    DelegateInvoke,
    OperatorCall,
}

impl CallEdgeKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectCall => "direct_call",
            Self::Constructor => "constructor",
            Self::PropertyGetter => "property_getter",
            Self::PropertySetter => "property_setter",
            Self::ExtensionMethod => "extension_method",
            Self::InterfaceCall => "interface_call",
            Self::VirtualCall => "virtual_call",
            Self::StaticCall => "static_call",
            Self::DelegateInvoke => "delegate_invoke",
            Self::OperatorCall => "operator_call",
        }
    }
}

/// Declaration metadata for one method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub id: MethodId,

    /// Method simple name
    pub name: String,

    /// Simple name of the containing type
    pub containing_type: String,

    /// Source file declaring the method; `None` for external stubs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// 1-indexed start line; 0 for external stubs
    #[serde(default)]
    pub start_line: usize,

    /// Whether the method was identified as a test
    #[serde(default)]
    pub is_test: bool,

    /// Declared outside the analyzed solution (location unknown)
    #[serde(default)]
    pub is_external: bool,
}

impl MethodInfo {
    /// Metadata for a declared method
    pub fn declared(id: MethodId, file: PathBuf, start_line: usize) -> Self {
        let name = id.simple_name().to_string();
        let containing_type = id.type_simple_name().to_string();
        Self {
            id,
            name,
            containing_type,
            file: Some(file),
            start_line,
            is_test: false,
            is_external: false,
        }
    }

    /// Stub metadata for a callee with no known declaration
    pub fn external(id: MethodId) -> Self {
        let name = id.simple_name().to_string();
        let containing_type = id.type_simple_name().to_string();
        Self {
            id,
            name,
            containing_type,
            file: None,
            start_line: 0,
            is_test: false,
            is_external: true,
        }
    }
}

/// Forward and reverse adjacency over `MethodId`s
#[derive(Debug, Default)]
pub struct MethodCallGraph {
    /// Caller -> callees, insertion-ordered, deduplicated
    forward: AHashMap<MethodId, Vec<MethodId>>,

    /// Callee -> callers; exact transpose of `forward`
    reverse: AHashMap<MethodId, Vec<MethodId>>,

    /// Edge kinds keyed by (caller, callee)
    edge_kinds: AHashMap<(MethodId, MethodId), CallEdgeKind>,

    /// Declaration metadata per node
    methods: AHashMap<MethodId, MethodInfo>,
}

impl MethodCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method node; first registration wins, except that a
    /// declared entry always replaces an external stub.
    pub fn register(&mut self, info: MethodInfo) {
        let id = info.id.clone();
        match self.methods.get(&id) {
            Some(existing) if !existing.is_external => {}
            _ => {
                self.methods.insert(id.clone(), info);
            }
        }
        self.forward.entry(id.clone()).or_default();
        self.reverse.entry(id).or_default();
    }

    /// Add a forward edge; the reverse edge is maintained in lockstep.
    /// Unknown endpoints are registered as external stubs.
    pub fn add_edge(&mut self, caller: MethodId, callee: MethodId, kind: CallEdgeKind) {
        if !self.methods.contains_key(&caller) {
            self.register(MethodInfo::external(caller.clone()));
        }
        if !self.methods.contains_key(&callee) {
            self.register(MethodInfo::external(callee.clone()));
        }

        let callees = self.forward.entry(caller.clone()).or_default();
        if !callees.contains(&callee) {
            callees.push(callee.clone());
            self.reverse
                .entry(callee.clone())
                .or_default()
                .push(caller.clone());
            self.edge_kinds.insert((caller, callee), kind);
        }
    }

    /// Mark a method as a test
    pub fn mark_test(&mut self, id: &MethodId) {
        if let Some(info) = self.methods.get_mut(id) {
            info.is_test = true;
        }
    }

    pub fn callees(&self, id: &MethodId) -> &[MethodId] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn callers(&self, id: &MethodId) -> &[MethodId] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn method(&self, id: &MethodId) -> Option<&MethodInfo> {
        self.methods.get(id)
    }

    pub fn edge_kind(&self, caller: &MethodId, callee: &MethodId) -> Option<CallEdgeKind> {
        self.edge_kinds
            .get(&(caller.clone(), callee.clone()))
            .copied()
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.methods.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.methods.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    /// All registered ids, sorted (for deterministic iteration)
    pub fn sorted_ids(&self) -> Vec<&MethodId> {
        let mut ids: Vec<&MethodId> = self.methods.keys().collect();
        ids.sort();
        ids
    }

    /// All test-method ids, sorted
    pub fn test_methods(&self) -> Vec<&MethodId> {
        let mut ids: Vec<&MethodId> = self
            .methods
            .values()
            .filter(|m| m.is_test)
            .map(|m| &m.id)
            .collect();
        ids.sort();
        ids
    }

    /// Verify the reverse graph is the exact transpose of the forward graph.
    ///
    /// A mismatch is a logic bug, not an input problem.
    pub fn verify_transpose(&self) -> Result<()> {
        for (caller, callees) in &self.forward {
            for callee in callees {
                let ok = self
                    .reverse
                    .get(callee)
                    .map(|callers| callers.contains(caller))
                    .unwrap_or(false);
                if !ok {
                    return Err(EngineError::Internal {
                        message: format!(
                            "reverse graph missing edge {} -> {}",
                            callee, caller
                        ),
                    });
                }
            }
        }
        let forward_edges: usize = self.forward.values().map(Vec::len).sum();
        let reverse_edges: usize = self.reverse.values().map(Vec::len).sum();
        if forward_edges != reverse_edges {
            return Err(EngineError::Internal {
                message: format!(
                    "edge count mismatch: forward {} vs reverse {}",
                    forward_edges, reverse_edges
                ),
            });
        }
        Ok(())
    }

    /// Deterministic serializable form: adjacency sorted by key, neighbor
    /// lists preserving insertion order.
    pub fn to_serializable(&self) -> SerializableGraph {
        let forward: BTreeMap<String, Vec<String>> = self
            .forward
            .iter()
            .map(|(k, v)| {
                (
                    k.qualified_name(),
                    v.iter().map(MethodId::qualified_name).collect(),
                )
            })
            .collect();
        let reverse: BTreeMap<String, Vec<String>> = self
            .reverse
            .iter()
            .map(|(k, v)| {
                (
                    k.qualified_name(),
                    v.iter().map(MethodId::qualified_name).collect(),
                )
            })
            .collect();
        let methods: BTreeMap<String, MethodInfo> = self
            .methods
            .iter()
            .map(|(k, v)| (k.qualified_name(), v.clone()))
            .collect();
        let edge_kinds: BTreeMap<String, CallEdgeKind> = self
            .edge_kinds
            .iter()
            .map(|((caller, callee), kind)| {
                (
                    format!("{} -> {}", caller.qualified_name(), callee.qualified_name()),
                    *kind,
                )
            })
            .collect();
        SerializableGraph {
            forward,
            reverse,
            methods,
            edge_kinds,
        }
    }

    /// Rebuild a graph from its serialized form
    pub fn from_serializable(data: SerializableGraph) -> Self {
        let mut graph = Self::new();
        for (_, info) in data.methods {
            graph.register(info);
        }
        for (caller, callees) in data.forward {
            if let Some(caller_id) = MethodId::parse(&caller) {
                for callee in callees {
                    if let Some(callee_id) = MethodId::parse(&callee) {
                        let kind = data
                            .edge_kinds
                            .get(&format!(
                                "{} -> {}",
                                caller_id.qualified_name(),
                                callee_id.qualified_name()
                            ))
                            .copied()
                            .unwrap_or(CallEdgeKind::DirectCall);
                        graph.add_edge(caller_id.clone(), callee_id, kind);
                    }
                }
            }
        }
        graph
    }

    /// Induced subgraph on a node set, preserving edge kinds and metadata
    pub fn induced_subgraph(&self, nodes: &AHashSet<MethodId>) -> MethodCallGraph {
        let mut sub = MethodCallGraph::new();
        let mut sorted: Vec<&MethodId> = nodes.iter().collect();
        sorted.sort();
        for id in &sorted {
            if let Some(info) = self.methods.get(*id) {
                sub.register(info.clone());
            }
        }
        for id in &sorted {
            for callee in self.callees(id) {
                if nodes.contains(callee) {
                    let kind = self
                        .edge_kind(id, callee)
                        .unwrap_or(CallEdgeKind::DirectCall);
                    sub.add_edge((*id).clone(), callee.clone(), kind);
                }
            }
        }
        sub
    }
}

/// JSON-stable projection of a call graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub forward: BTreeMap<String, Vec<String>>,
    pub reverse: BTreeMap<String, Vec<String>>,
    pub methods: BTreeMap<String, MethodInfo>,
    #[serde(default)]
    pub edge_kinds: BTreeMap<String, CallEdgeKind>,
}
