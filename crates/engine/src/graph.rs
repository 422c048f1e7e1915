//! Dependency graph over task ids.
//!
//! Edges point from upstream to downstream and carry a weight plus an
//! optional milestone gate. Shape rules that need task data (disciplines,
//! declared milestones) are enforced by the owning state before insertion;
//! this module owns everything that can be checked on ids alone.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use flowline_core::{Error, Result, TaskId};

/// Relationship class carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Downstream consumes the upstream's output.
    Requires,
    /// Upstream is a validation task signing off the downstream's output.
    Validates,
    /// Advisory capacity lending. Never persisted.
    Supports,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Requires => write!(f, "requires"),
            EdgeKind::Validates => write!(f, "validates"),
            EdgeKind::Supports => write!(f, "supports"),
        }
    }
}

/// A directed, weighted dependency between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub upstream: TaskId,
    pub downstream: TaskId,
    pub weight: f64,
    pub kind: EdgeKind,
    /// Milestone label on the upstream task that opens this edge early.
    /// Only meaningful on `Requires` edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
}

impl Edge {
    pub fn new(upstream: TaskId, downstream: TaskId, weight: f64, kind: EdgeKind) -> Self {
        Self { upstream, downstream, weight, kind, gate: None }
    }

    pub fn gated(mut self, label: impl Into<String>) -> Self {
        self.gate = Some(label.into());
        self
    }
}

/// Adjacency-list graph with stable insertion order per endpoint.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: HashSet<TaskId>,
    edges: Vec<Edge>,
    outgoing: HashMap<TaskId, Vec<usize>>,
    incoming: HashMap<TaskId, Vec<usize>>,
    // One edge per (upstream, downstream, kind); re-linking updates in place.
    dedup: HashMap<(TaskId, TaskId, EdgeKind), usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task id so edges may reference it.
    pub fn register(&mut self, task: TaskId) {
        self.nodes.insert(task);
        self.outgoing.entry(task).or_default();
        self.incoming.entry(task).or_default();
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.nodes.contains(&task)
    }

    /// Inserts an edge, or updates weight and gate if the same
    /// (upstream, downstream, kind) triple is already linked.
    ///
    /// Rejects `Supports` edges, unregistered endpoints, non-finite or
    /// negative weights, gates on anything but `Requires`, and `Requires`
    /// edges that would close a cycle in the `Requires` subgraph.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if edge.kind == EdgeKind::Supports {
            return Err(Error::InvalidLink(
                "supports edges are advisory-only and are never persisted".into(),
            ));
        }
        if !self.contains(edge.upstream) {
            return Err(Error::DanglingReference(edge.upstream));
        }
        if !self.contains(edge.downstream) {
            return Err(Error::DanglingReference(edge.downstream));
        }
        if !edge.weight.is_finite() || edge.weight < 0.0 {
            return Err(Error::InvalidLink(format!(
                "edge weight must be finite and non-negative, got {}",
                edge.weight
            )));
        }
        if edge.gate.is_some() && edge.kind != EdgeKind::Requires {
            return Err(Error::InvalidLink(format!(
                "milestone gates only apply to requires edges, not {}",
                edge.kind
            )));
        }
        if edge.kind == EdgeKind::Requires {
            if edge.upstream == edge.downstream {
                return Err(Error::CycleDetected {
                    upstream: edge.upstream,
                    downstream: edge.downstream,
                });
            }
            // The requires subgraph stays a DAG. Checked before insertion so a
            // rejected link leaves no trace.
            if self.requires_reaches(edge.downstream, edge.upstream) {
                return Err(Error::CycleDetected {
                    upstream: edge.upstream,
                    downstream: edge.downstream,
                });
            }
        }

        let key = (edge.upstream, edge.downstream, edge.kind);
        if let Some(&idx) = self.dedup.get(&key) {
            self.edges[idx].weight = edge.weight;
            self.edges[idx].gate = edge.gate;
            return Ok(());
        }

        let idx = self.edges.len();
        self.outgoing.entry(edge.upstream).or_default().push(idx);
        self.incoming.entry(edge.downstream).or_default().push(idx);
        self.dedup.insert(key, idx);
        self.edges.push(edge);
        Ok(())
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges of `kind` arriving at `task`, in insertion order.
    pub fn upstream_edges(&self, task: TaskId, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(&task)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.edges[i])
            .filter(move |e| e.kind == kind)
    }

    /// Edges of `kind` leaving `task`, in insertion order.
    pub fn downstream_edges(
        &self,
        task: TaskId,
        kind: EdgeKind,
    ) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(&task)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.edges[i])
            .filter(move |e| e.kind == kind)
    }

    pub fn upstream_of(&self, task: TaskId, kind: EdgeKind) -> impl Iterator<Item = TaskId> + '_ {
        self.upstream_edges(task, kind).map(|e| e.upstream)
    }

    pub fn downstream_of(&self, task: TaskId, kind: EdgeKind) -> impl Iterator<Item = TaskId> + '_ {
        self.downstream_edges(task, kind).map(|e| e.downstream)
    }

    /// Validation tasks that must sign off `task`'s output.
    pub fn validators_of(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.upstream_of(task, EdgeKind::Validates)
    }

    /// Tasks whose output `task` signs off.
    pub fn validated_by(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.downstream_of(task, EdgeKind::Validates)
    }

    /// Number of distinct tasks downstream of `task` over requires and
    /// validates edges combined, excluding `task` itself.
    ///
    /// The combined relation may contain two-cycles (a validator requires the
    /// output it validates), so traversal carries a visited set and always
    /// terminates.
    pub fn transitive_block_count(&self, task: TaskId) -> usize {
        let mut visited = HashSet::new();
        visited.insert(task);
        let mut stack = vec![task];
        while let Some(current) = stack.pop() {
            for idx in self.outgoing.get(&current).map(|v| v.as_slice()).unwrap_or(&[]) {
                let edge = &self.edges[*idx];
                if edge.kind == EdgeKind::Supports {
                    continue;
                }
                if visited.insert(edge.downstream) {
                    stack.push(edge.downstream);
                }
            }
        }
        visited.len() - 1
    }

    /// Tasks reachable from `task` over requires edges, excluding `task`.
    /// Order is deterministic: breadth-first, edges in insertion order.
    pub fn requires_descendants(&self, task: TaskId) -> Vec<TaskId> {
        let mut visited = HashSet::new();
        visited.insert(task);
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(task);
        while let Some(current) = queue.pop_front() {
            for edge in self.downstream_edges(current, EdgeKind::Requires) {
                if visited.insert(edge.downstream) {
                    order.push(edge.downstream);
                    queue.push_back(edge.downstream);
                }
            }
        }
        order
    }

    /// True if `to` is reachable from `from` over requires edges.
    fn requires_reaches(&self, from: TaskId, to: TaskId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        visited.insert(from);
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            for next in self.downstream_of(current, EdgeKind::Requires) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TaskId {
        TaskId::new(n)
    }

    fn graph_with(nodes: u64) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for n in 1..=nodes {
            g.register(id(n));
        }
        g
    }

    #[test]
    fn add_edge_rejects_unregistered_endpoints() {
        let mut g = graph_with(1);
        let err = g.add_edge(Edge::new(id(1), id(9), 1.0, EdgeKind::Requires)).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(t) if t == id(9)));
    }

    #[test]
    fn add_edge_rejects_supports() {
        let mut g = graph_with(2);
        let err = g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Supports)).unwrap_err();
        assert!(matches!(err, Error::InvalidLink(_)));
    }

    #[test]
    fn add_edge_rejects_bad_weight() {
        let mut g = graph_with(2);
        for w in [-0.1, f64::NAN, f64::INFINITY] {
            let err = g.add_edge(Edge::new(id(1), id(2), w, EdgeKind::Requires)).unwrap_err();
            assert!(matches!(err, Error::InvalidLink(_)));
        }
    }

    #[test]
    fn add_edge_rejects_gate_on_validates() {
        let mut g = graph_with(2);
        let err = g
            .add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Validates).gated("frame"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLink(_)));
    }

    #[test]
    fn relink_updates_weight_in_place() {
        let mut g = graph_with(2);
        g.add_edge(Edge::new(id(1), id(2), 0.5, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(1), id(2), 0.9, EdgeKind::Requires).gated("frame")).unwrap();
        assert_eq!(g.edge_count(), 1);
        let edge = &g.edges()[0];
        assert_eq!(edge.weight, 0.9);
        assert_eq!(edge.gate.as_deref(), Some("frame"));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut g = graph_with(1);
        let err = g.add_edge(Edge::new(id(1), id(1), 1.0, EdgeKind::Requires)).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[test]
    fn transitive_requires_cycle_is_rejected_without_trace() {
        let mut g = graph_with(3);
        g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(2), id(3), 1.0, EdgeKind::Requires)).unwrap();
        let before = g.edge_count();
        let err = g.add_edge(Edge::new(id(3), id(1), 1.0, EdgeKind::Requires)).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { upstream, downstream }
            if upstream == id(3) && downstream == id(1)));
        assert_eq!(g.edge_count(), before);
    }

    #[test]
    fn validates_may_close_a_two_cycle() {
        // Validator requires the output it validates. Legal: acyclicity is
        // only enforced on the requires subgraph.
        let mut g = graph_with(2);
        g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(2), id(1), 1.0, EdgeKind::Validates)).unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.transitive_block_count(id(1)), 1);
        assert_eq!(g.transitive_block_count(id(2)), 1);
    }

    #[test]
    fn adjacency_preserves_insertion_order() {
        let mut g = graph_with(4);
        g.add_edge(Edge::new(id(2), id(1), 0.3, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(3), id(1), 0.2, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(4), id(1), 0.1, EdgeKind::Requires)).unwrap();
        let ups: Vec<_> = g.upstream_of(id(1), EdgeKind::Requires).collect();
        assert_eq!(ups, vec![id(2), id(3), id(4)]);
    }

    #[test]
    fn block_count_over_diamond_counts_distinct_tasks() {
        //    1 -> 2 -> 4
        //    1 -> 3 -> 4
        let mut g = graph_with(4);
        g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(1), id(3), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(2), id(4), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(3), id(4), 1.0, EdgeKind::Requires)).unwrap();
        assert_eq!(g.transitive_block_count(id(1)), 3);
        assert_eq!(g.transitive_block_count(id(4)), 0);
    }

    #[test]
    fn block_count_spans_validates_edges() {
        // 1 -(validates)-> 2 -(requires)-> 3
        let mut g = graph_with(3);
        g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Validates)).unwrap();
        g.add_edge(Edge::new(id(2), id(3), 1.0, EdgeKind::Requires)).unwrap();
        assert_eq!(g.transitive_block_count(id(1)), 2);
    }

    #[test]
    fn requires_descendants_excludes_validates() {
        let mut g = graph_with(3);
        g.add_edge(Edge::new(id(1), id(2), 1.0, EdgeKind::Requires)).unwrap();
        g.add_edge(Edge::new(id(3), id(2), 1.0, EdgeKind::Validates)).unwrap();
        assert_eq!(g.requires_descendants(id(1)), vec![id(2)]);
        assert!(g.requires_descendants(id(3)).is_empty());
    }
}
