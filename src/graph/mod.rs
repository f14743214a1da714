//! Dependency graph for liveness analysis
//!
//! Pure Rust implementation using petgraph.

pub mod store;

pub use store::{
    DependencyGraph, GraphDiagnostics, GraphEdge, GraphExport, Provenance, RootClassification,
};
