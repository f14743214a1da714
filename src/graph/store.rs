//! File-level dependency graph built on petgraph
//!
//! Nodes are repo-relative file paths, edges are import/load relationships
//! tagged with where they came from. Static evidence is authoritative: a
//! dynamic edge is only recorded when no static edge already connects the
//! same pair.

use crate::models::FileRecord;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Where an edge was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Static,
    Dynamic,
}

/// An edge in exported form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub provenance: Provenance,
}

/// Root/leaf/connector split of the node set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootClassification {
    /// Nothing imports them
    pub roots: Vec<String>,
    /// They import nothing in the repo
    pub leaves: Vec<String>,
    /// Both imported and importing
    pub connectors: Vec<String>,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// Structural findings handed to the validator instead of being corrected
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    /// Edge endpoints that were never declared as files
    pub undeclared: Vec<String>,
    pub self_edges_dropped: usize,
    pub static_edges: usize,
    pub dynamic_edges: usize,
}

/// Serialisable adjacency for reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
}

/// Directed dependency graph over repository files
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, Provenance>,
    /// Node lookup by path
    node_index: FxHashMap<String, NodeIndex>,
    /// Nodes with index below this were declared as files
    declared: usize,
    self_edges_dropped: usize,
}

impl DependencyGraph {
    /// Build the graph from file records and the two edge sources.
    ///
    /// Every file becomes a node even without edges. Static edges go in
    /// first; dynamic edges only fill pairs that have no static edge.
    pub fn build(
        files: &[FileRecord],
        static_edges: &[(String, String)],
        dynamic_edges: &[(String, String)],
    ) -> Self {
        let mut graph = Self::default();

        for file in files {
            graph.ensure_node(&file.path);
        }
        graph.declared = graph.graph.node_count();

        for (src, dst) in static_edges {
            graph.insert_edge(src, dst, Provenance::Static);
        }
        for (src, dst) in dynamic_edges {
            graph.insert_edge(src, dst, Provenance::Dynamic);
        }

        let undeclared = graph.graph.node_count() - graph.declared;
        if undeclared > 0 {
            warn!(
                "{} edge endpoint(s) are not declared files; kept as nodes for validation",
                undeclared
            );
        }
        debug!(
            "Built dependency graph: {} nodes, {} edges ({} self-edges dropped)",
            graph.graph.node_count(),
            graph.graph.edge_count(),
            graph.self_edges_dropped
        );

        graph
    }

    fn ensure_node(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.node_index.insert(path.to_string(), idx);
        idx
    }

    /// Insert an edge unless it is a self-edge or the pair already exists
    fn insert_edge(&mut self, src: &str, dst: &str, provenance: Provenance) -> bool {
        if src.is_empty() || dst.is_empty() {
            return false;
        }
        if src == dst {
            self.self_edges_dropped += 1;
            return false;
        }
        let a = self.ensure_node(src);
        let b = self.ensure_node(dst);
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, provenance);
        true
    }

    // ==================== Node Operations ====================

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.node_index.contains_key(path)
    }

    pub fn index_of(&self, path: &str) -> Option<NodeIndex> {
        self.node_index.get(path).copied()
    }

    pub fn path_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// All node paths in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|s| s.as_str())
    }

    /// Direct imports of a file, sorted
    pub fn successors(&self, path: &str) -> Vec<&str> {
        let Some(idx) = self.index_of(path) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.path_of(n))
            .collect();
        out.sort_unstable();
        out
    }

    pub fn out_degree(&self, path: &str) -> usize {
        self.index_of(path)
            .map(|idx| self.graph.edges_directed(idx, Direction::Outgoing).count())
            .unwrap_or(0)
    }

    pub fn in_degree(&self, path: &str) -> usize {
        self.index_of(path)
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    /// Largest out-degree over all nodes (0 for an empty graph)
    pub fn max_out_degree(&self) -> usize {
        self.graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Outgoing).count())
            .max()
            .unwrap_or(0)
    }

    // ==================== Edge Operations ====================

    pub fn provenance(&self, src: &str, dst: &str) -> Option<Provenance> {
        let a = self.index_of(src)?;
        let b = self.index_of(dst)?;
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// All edges, sorted by (source, target)
    pub fn edges(&self) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = self
            .graph
            .edge_references()
            .map(|e| GraphEdge {
                source: self.path_of(e.source()).to_string(),
                target: self.path_of(e.target()).to_string(),
                provenance: *e.weight(),
            })
            .collect();
        edges.sort();
        edges
    }

    /// Iterate `(source, target)` pairs without allocating
    pub fn edge_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph
            .edge_references()
            .map(|e| (self.path_of(e.source()), self.path_of(e.target())))
    }

    // ==================== Analysis ====================

    /// Classify nodes by their position in the graph.
    ///
    /// Roots have no incoming edges, leaves have no outgoing edges; an
    /// isolated node is both. Connectors are everything else.
    pub fn classify_roots(&self) -> RootClassification {
        let mut roots = Vec::new();
        let mut leaves = Vec::new();
        let mut connectors = Vec::new();

        for idx in self.graph.node_indices() {
            let has_in = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .next()
                .is_some();
            let has_out = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .next()
                .is_some();
            let path = self.path_of(idx).to_string();
            match (has_in, has_out) {
                (false, false) => {
                    roots.push(path.clone());
                    leaves.push(path);
                }
                (false, true) => roots.push(path),
                (true, false) => leaves.push(path),
                (true, true) => connectors.push(path),
            }
        }

        roots.sort();
        leaves.sort();
        connectors.sort();

        RootClassification {
            roots,
            leaves,
            connectors,
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
        }
    }

    /// Nodes with no incoming edges but at least one outgoing edge
    pub fn roots_with_outgoing(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
                    && self
                        .graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .next()
                        .is_some()
            })
            .map(|idx| self.path_of(idx))
            .collect();
        out.sort_unstable();
        out
    }

    /// Forward closure from a node index, including the start
    pub fn reach_from(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(nx) = bfs.next(&self.graph) {
            out.push(nx);
        }
        out
    }

    /// Every file reachable from `start`, including `start` itself.
    ///
    /// Unknown starts yield a singleton set.
    pub fn reachable(&self, start: &str) -> BTreeSet<String> {
        match self.index_of(start) {
            Some(idx) => self
                .reach_from(idx)
                .into_iter()
                .map(|n| self.path_of(n).to_string())
                .collect(),
            None => BTreeSet::from([start.to_string()]),
        }
    }

    /// Union of the forward closures of several starts
    pub fn reachable_from_all<'a, I>(&self, starts: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut out = BTreeSet::new();
        for start in starts {
            match self.index_of(start) {
                Some(idx) if !seen.contains(&idx) => {
                    let mut bfs = Bfs::new(&self.graph, idx);
                    while let Some(nx) = bfs.next(&self.graph) {
                        if seen.insert(nx) {
                            out.insert(self.path_of(nx).to_string());
                        }
                    }
                }
                Some(_) => {}
                None => {
                    out.insert(start.to_string());
                }
            }
        }
        out
    }

    /// Subgraph restricted to ACTIVE files
    pub fn active_subgraph(&self, files: &[FileRecord]) -> BTreeMap<String, BTreeSet<String>> {
        let active: FxHashSet<&str> = files
            .iter()
            .filter(|f| f.is_active())
            .map(|f| f.path.as_str())
            .collect();

        let mut sub = BTreeMap::new();
        for path in self.nodes() {
            if !active.contains(path) {
                continue;
            }
            let targets = self
                .successors(path)
                .into_iter()
                .filter(|t| active.contains(t))
                .map(String::from)
                .collect();
            sub.insert(path.to_string(), targets);
        }
        sub
    }

    pub fn diagnostics(&self) -> GraphDiagnostics {
        let mut undeclared: Vec<String> = self
            .graph
            .node_indices()
            .filter(|idx| idx.index() >= self.declared)
            .map(|idx| self.path_of(idx).to_string())
            .collect();
        undeclared.sort();

        let static_edges = self
            .graph
            .edge_weights()
            .filter(|p| **p == Provenance::Static)
            .count();

        GraphDiagnostics {
            undeclared,
            self_edges_dropped: self.self_edges_dropped,
            static_edges,
            dynamic_edges: self.graph.edge_count() - static_edges,
        }
    }

    pub fn export(&self) -> GraphExport {
        let mut nodes: Vec<String> = self.nodes().map(String::from).collect();
        nodes.sort();
        GraphExport {
            nodes,
            edges: self.edges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;

    fn files(paths: &[&str]) -> Vec<FileRecord> {
        paths
            .iter()
            .map(|p| FileRecord::new(*p, Confidence::Med))
            .collect()
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_isolated_nodes_are_kept() {
        let g = DependencyGraph::build(
            &files(&["a.py", "b.py", "d.py"]),
            &edges(&[("a.py", "b.py")]),
            &[],
        );
        assert_eq!(g.node_count(), 3);
        assert!(g.contains("d.py"));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_self_edges_dropped() {
        let g = DependencyGraph::build(&files(&["a.py"]), &edges(&[("a.py", "a.py")]), &[]);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.diagnostics().self_edges_dropped, 1);
    }

    #[test]
    fn test_static_wins_over_dynamic() {
        let g = DependencyGraph::build(
            &files(&["a.py", "b.py", "c.py"]),
            &edges(&[("a.py", "b.py")]),
            &edges(&[("a.py", "b.py"), ("b.py", "c.py")]),
        );
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.provenance("a.py", "b.py"), Some(Provenance::Static));
        assert_eq!(g.provenance("b.py", "c.py"), Some(Provenance::Dynamic));
        let diag = g.diagnostics();
        assert_eq!(diag.static_edges, 1);
        assert_eq!(diag.dynamic_edges, 1);
    }

    #[test]
    fn test_undeclared_endpoints_become_nodes() {
        let g = DependencyGraph::build(&files(&["a.py"]), &edges(&[("a.py", "ghost.py")]), &[]);
        assert!(g.contains("ghost.py"));
        assert_eq!(g.diagnostics().undeclared, vec!["ghost.py".to_string()]);
    }

    #[test]
    fn test_classify_roots() {
        let g = DependencyGraph::build(
            &files(&["a", "b", "c", "d"]),
            &edges(&[("a", "b"), ("b", "c")]),
            &[],
        );
        let c = g.classify_roots();
        assert_eq!(c.roots, vec!["a", "d"]);
        assert_eq!(c.leaves, vec!["c", "d"]);
        assert_eq!(c.connectors, vec!["b"]);
        assert_eq!(c.total_nodes, 4);
        assert_eq!(c.total_edges, 2);
        assert_eq!(g.roots_with_outgoing(), vec!["a"]);
    }

    #[test]
    fn test_reachable_tolerates_cycles_and_is_closed() {
        let g = DependencyGraph::build(
            &files(&["a", "b", "c", "d"]),
            &edges(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")]),
            &[],
        );
        let r = g.reachable("a");
        assert_eq!(r, BTreeSet::from(["a".into(), "b".into(), "c".into()]));
        for (src, dst) in g.edge_pairs() {
            if r.contains(src) {
                assert!(r.contains(dst), "edge {src}->{dst} leaves the closure");
            }
        }
    }

    #[test]
    fn test_reachable_unknown_start_is_singleton() {
        let g = DependencyGraph::build(&files(&["a"]), &[], &[]);
        assert_eq!(g.reachable("nope"), BTreeSet::from(["nope".to_string()]));
    }

    #[test]
    fn test_reachable_from_all_unions() {
        let g = DependencyGraph::build(
            &files(&["a", "b", "c", "d"]),
            &edges(&[("a", "b"), ("c", "d")]),
            &[],
        );
        let r = g.reachable_from_all(["a", "c"]);
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn test_degrees() {
        let g = DependencyGraph::build(
            &files(&["a", "b", "c"]),
            &edges(&[("a", "b"), ("a", "c"), ("b", "c")]),
            &[],
        );
        assert_eq!(g.out_degree("a"), 2);
        assert_eq!(g.in_degree("c"), 2);
        assert_eq!(g.max_out_degree(), 2);
        assert_eq!(g.out_degree("missing"), 0);
    }

    #[test]
    fn test_active_subgraph() {
        let mut recs = files(&["a", "b", "c"]);
        recs[2].set_confidence(Confidence::Low);
        let g = DependencyGraph::build(&recs, &edges(&[("a", "b"), ("b", "c")]), &[]);
        let sub = g.active_subgraph(&recs);
        assert_eq!(sub.len(), 2);
        assert!(sub["b"].is_empty());
    }
}
