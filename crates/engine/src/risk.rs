//! Propagated-risk scoring and admission gating.

use serde::{Deserialize, Serialize};

use flowline_core::{EngineConfig, TaskId};

use crate::graph::{DependencyGraph, EdgeKind};
use crate::lifecycle::TaskStore;

/// Admission class for a ready forward task. Ordered by how eagerly the
/// scheduler hands the task out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskGate {
    /// Safe to start now.
    Start,
    /// Start only if capacity is otherwise idle; rework is plausible.
    Tentative,
    /// Too exposed to upstream churn. Kept out of the queue this tick.
    Hold,
}

impl std::fmt::Display for RiskGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskGate::Start => write!(f, "start"),
            RiskGate::Tentative => write!(f, "tentative"),
            RiskGate::Hold => write!(f, "hold"),
        }
    }
}

/// Risk inherited by `task` from its direct requires upstreams: the sum of
/// upstream volatility scaled by edge weight, clamped to [0, 1].
///
/// Upstream lifecycle state is deliberately ignored. A finished but volatile
/// design is still a rework hazard for everything built on top of it.
pub fn propagated_risk(task: TaskId, store: &TaskStore, graph: &DependencyGraph) -> f64 {
    let mut score = 0.0;
    for edge in graph.upstream_edges(task, EdgeKind::Requires) {
        let Some(upstream) = store.task(edge.upstream) else {
            continue;
        };
        score += upstream.volatility * edge.weight;
    }
    score.clamp(0.0, 1.0)
}

/// Maps a propagated-risk score onto an admission gate.
///
/// The hold boundary is exclusive and the tentative boundary inclusive: a
/// score exactly at the hold threshold is still tentative.
pub fn classify(score: f64, config: &EngineConfig) -> RiskGate {
    if score > config.hold_threshold {
        RiskGate::Hold
    } else if score >= config.tentative_threshold {
        RiskGate::Tentative
    } else {
        RiskGate::Start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::{LifecycleState, TaskSpec};

    use crate::graph::Edge;
    use crate::ledger::RiskLedger;

    fn setup() -> (TaskStore, DependencyGraph, EngineConfig) {
        (TaskStore::new(), DependencyGraph::new(), EngineConfig::default())
    }

    fn forward(store: &mut TaskStore, graph: &mut DependencyGraph, volatility: f64) -> TaskId {
        let id = store
            .create(TaskSpec::forward(format!("fwd-{volatility}"), volatility))
            .unwrap();
        graph.register(id);
        id
    }

    #[test]
    fn no_upstreams_scores_zero() {
        let (mut store, mut graph, config) = setup();
        let t = forward(&mut store, &mut graph, 0.9);
        assert_eq!(propagated_risk(t, &store, &graph), 0.0);
        assert_eq!(classify(0.0, &config), RiskGate::Start);
    }

    #[test]
    fn score_is_weighted_sum_of_direct_upstreams() {
        let (mut store, mut graph, _) = setup();
        let a = forward(&mut store, &mut graph, 0.6);
        let b = forward(&mut store, &mut graph, 0.4);
        let t = forward(&mut store, &mut graph, 0.0);
        graph.add_edge(Edge::new(a, t, 0.5, EdgeKind::Requires)).unwrap();
        graph.add_edge(Edge::new(b, t, 1.0, EdgeKind::Requires)).unwrap();
        let score = propagated_risk(t, &store, &graph);
        assert!((score - (0.6 * 0.5 + 0.4)).abs() < 1e-12);
    }

    #[test]
    fn score_clamps_at_one() {
        let (mut store, mut graph, _) = setup();
        let a = forward(&mut store, &mut graph, 0.9);
        let b = forward(&mut store, &mut graph, 0.9);
        let t = forward(&mut store, &mut graph, 0.0);
        graph.add_edge(Edge::new(a, t, 1.0, EdgeKind::Requires)).unwrap();
        graph.add_edge(Edge::new(b, t, 1.0, EdgeKind::Requires)).unwrap();
        assert_eq!(propagated_risk(t, &store, &graph), 1.0);
    }

    #[test]
    fn finished_upstreams_still_contribute() {
        let (mut store, mut graph, _) = setup();
        let mut ledger = RiskLedger::new();
        let a = forward(&mut store, &mut graph, 0.7);
        let t = forward(&mut store, &mut graph, 0.0);
        graph.add_edge(Edge::new(a, t, 1.0, EdgeKind::Requires)).unwrap();
        store.update_progress(&graph, &mut ledger, a, 1.0).unwrap();
        assert_eq!(store.get(a).unwrap().state, LifecycleState::Done);
        assert!((propagated_risk(t, &store, &graph) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn classification_boundaries() {
        let config = EngineConfig::default();
        assert_eq!(classify(0.49, &config), RiskGate::Start);
        assert_eq!(classify(0.5, &config), RiskGate::Tentative);
        assert_eq!(classify(0.8, &config), RiskGate::Tentative);
        assert_eq!(classify(0.8000001, &config), RiskGate::Hold);
        assert_eq!(classify(1.0, &config), RiskGate::Hold);
    }

    #[test]
    fn gates_order_by_admission_eagerness() {
        assert!(RiskGate::Start < RiskGate::Tentative);
        assert!(RiskGate::Tentative < RiskGate::Hold);
    }
}
