//! Call graph model and builders

pub mod builder;
pub mod incremental;
pub mod model;
pub mod visitor;

pub use builder::{build_full, BuildOutcome, BuildStats, GraphOptions};
pub use incremental::{IncrementalBuilder, IncrementalOptions, TraverseDirection};
pub use model::{CallEdgeKind, MethodCallGraph, MethodInfo, SerializableGraph};
