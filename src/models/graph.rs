use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::resolved_package::ResolvedPackage;

/// Opaque arena index. Edges carry `NodeId`s rather than references, per the
/// §9 redesign flag ("cyclic dependency graphs ... arena of nodes indexed by
/// integer IDs; edges carry IDs, not references").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// The version spec that induced this edge, per spec §3 invariant (iii).
    pub version_spec: String,
}

/// DAG of `ResolvedPackage` nodes, arena-backed.
///
/// Invariants (spec §3):
/// (i) at most one node per `(kind, name)` in the final flattened output,
///     except the documented per-ecosystem exceptions (npm hoisting, Maven
///     nearest-wins keeps one G:A at the nearest depth);
/// (ii) no unresolved placeholders once `flatten()` is called;
/// (iii) every edge carries the `version_spec` that induced it;
/// (iv) conflicts are recorded on the graph, not hidden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<ResolvedPackage>,
    edges: Vec<Edge>,
    roots: Vec<NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, package: ResolvedPackage) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(package);
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, version_spec: impl Into<String>) {
        self.edges.push(Edge {
            from,
            to,
            version_spec: version_spec.into(),
        });
    }

    pub fn mark_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    pub fn node(&self, id: NodeId) -> &ResolvedPackage {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> &[ResolvedPackage] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Appends `other`'s nodes/edges/roots onto this graph, offsetting
    /// every `NodeId` so ids stay unique. Used by the ecosystem router to
    /// combine each per-ecosystem resolver's independent graph into one
    /// combined graph for the engine's output (spec §6: a single flat
    /// `ResolvedPackage[]` plus one `DependencyGraph` for inspection).
    pub fn merge(&mut self, other: DependencyGraph) {
        let offset = self.nodes.len() as u32;
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges.into_iter().map(|e| Edge {
            from: NodeId(e.from.0 + offset),
            to: NodeId(e.to.0 + offset),
            version_spec: e.version_spec,
        }));
        self.roots.extend(other.roots.into_iter().map(|r| NodeId(r.0 + offset)));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flattens the graph to the output list described in spec §6, one
    /// `ResolvedPackage` per id in insertion order (callers that need
    /// ecosystem-specific dedup — npm's per-path duplicates, Maven's
    /// nearest-wins — perform it before nodes are added, so the arena
    /// itself never needs to special-case a kind).
    pub fn flatten(&self) -> Vec<ResolvedPackage> {
        self.nodes.clone()
    }

    /// Visited-set cycle guard shared by every resolver (§4.5: "never hang
    /// on cycles"). Returns the set of node ids reachable from `roots`
    /// without revisiting an id already on the current path.
    pub fn detect_cycle_from(&self, start: NodeId) -> bool {
        let mut visiting: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![start];
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from).or_default().push(edge.to);
        }
        let mut path = Vec::new();
        fn visit(
            node: NodeId,
            adjacency: &HashMap<NodeId, Vec<NodeId>>,
            path: &mut Vec<NodeId>,
            visiting: &mut HashSet<NodeId>,
        ) -> bool {
            if path.contains(&node) {
                return true;
            }
            if visiting.contains(&node) {
                return false;
            }
            path.push(node);
            visiting.insert(node);
            if let Some(children) = adjacency.get(&node) {
                for &child in children {
                    if visit(child, adjacency, path, visiting) {
                        return true;
                    }
                }
            }
            path.pop();
            false
        }
        let found = visit(start, &adjacency, &mut path, &mut visiting);
        stack.clear();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ecosystem::EcosystemKind;

    #[test]
    fn detects_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(ResolvedPackage::new(EcosystemKind::Npm, "a", "1.0.0"));
        let b = graph.add_node(ResolvedPackage::new(EcosystemKind::Npm, "b", "1.0.0"));
        graph.add_edge(a, b, "^1.0.0");
        graph.add_edge(b, a, "^1.0.0");
        assert!(graph.detect_cycle_from(a));
    }

    #[test]
    fn acyclic_graph_is_not_flagged() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(ResolvedPackage::new(EcosystemKind::Npm, "a", "1.0.0"));
        let b = graph.add_node(ResolvedPackage::new(EcosystemKind::Npm, "b", "1.0.0"));
        graph.add_edge(a, b, "^1.0.0");
        assert!(!graph.detect_cycle_from(a));
    }
}
