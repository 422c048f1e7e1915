//! Milestone crossings and the readiness predicate.

use flowline_core::{Milestone, Task};

use crate::graph::{DependencyGraph, EdgeKind};
use crate::lifecycle::TaskStore;

/// Latch every milestone whose threshold lies in (old, new] and return the
/// crossed labels in declaration order. A decrease never crosses anything
/// and never drops an existing latch.
pub fn latch_crossings(milestones: &mut [Milestone], old: f64, new: f64) -> Vec<String> {
    let mut crossed = Vec::new();
    if new <= old {
        return crossed;
    }
    for m in milestones.iter_mut() {
        if !m.reached && old < m.threshold && m.threshold <= new {
            m.reached = true;
            crossed.push(m.label.clone());
        }
    }
    crossed
}

/// Drop every latch. Only downstream scraps do this.
pub fn clear_latches(milestones: &mut [Milestone]) {
    for m in milestones.iter_mut() {
        m.reached = false;
    }
}

/// True when every requires upstream of `task` is satisfied: a gated edge
/// needs its named milestone latched, an ungated edge needs the upstream's
/// work complete. Tasks with no requires upstreams are trivially ready.
///
/// The predicate says nothing about `task`'s own state; callers pick which
/// states they ask it about.
pub fn is_ready(task: &Task, store: &TaskStore, graph: &DependencyGraph) -> bool {
    for edge in graph.upstream_edges(task.id, EdgeKind::Requires) {
        let Some(upstream) = store.task(edge.upstream) else {
            return false;
        };
        let satisfied = match &edge.gate {
            Some(label) => upstream
                .milestone(label)
                .map(|m| m.reached)
                .unwrap_or(false),
            None => upstream.state.is_work_complete(),
        };
        if !satisfied {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::TaskSpec;

    use crate::graph::Edge;
    use crate::ledger::RiskLedger;

    #[test]
    fn crossing_latches_thresholds_in_half_open_window() {
        let mut ms = vec![Milestone::new(0.25, "sketch"), Milestone::new(0.6, "frame")];
        assert_eq!(latch_crossings(&mut ms, 0.0, 0.25), vec!["sketch"]);
        assert!(ms[0].reached);
        assert!(!ms[1].reached);
        // Re-crossing the same threshold does not fire again.
        assert!(latch_crossings(&mut ms, 0.25, 0.5).is_empty());
    }

    #[test]
    fn one_jump_can_cross_several_milestones() {
        let mut ms = vec![Milestone::new(0.2, "a"), Milestone::new(0.4, "b")];
        assert_eq!(latch_crossings(&mut ms, 0.0, 0.9), vec!["a", "b"]);
    }

    #[test]
    fn decrease_crosses_nothing_and_keeps_latches() {
        let mut ms = vec![Milestone::new(0.5, "half")];
        latch_crossings(&mut ms, 0.0, 0.7);
        assert!(ms[0].reached);
        assert!(latch_crossings(&mut ms, 0.7, 0.2).is_empty());
        assert!(ms[0].reached);
    }

    #[test]
    fn clear_latches_resets_every_milestone() {
        let mut ms = vec![Milestone::new(0.2, "a"), Milestone::new(0.8, "b")];
        latch_crossings(&mut ms, 0.0, 1.0);
        clear_latches(&mut ms);
        assert!(ms.iter().all(|m| !m.reached));
    }

    #[test]
    fn readiness_follows_gates_and_work_completion() {
        let mut store = TaskStore::new();
        let mut graph = DependencyGraph::new();
        let mut ledger = RiskLedger::new();

        let cad = store
            .create(TaskSpec::forward("leg cad", 0.3).with_milestone(0.4, "frame"))
            .unwrap();
        let gated = store.create(TaskSpec::forward("leg fab", 0.1)).unwrap();
        let plain = store.create(TaskSpec::forward("leg firmware", 0.1)).unwrap();
        for id in [cad, gated, plain] {
            graph.register(id);
        }
        graph
            .add_edge(Edge::new(cad, gated, 0.9, EdgeKind::Requires).gated("frame"))
            .unwrap();
        graph.add_edge(Edge::new(cad, plain, 0.9, EdgeKind::Requires)).unwrap();

        // Nothing satisfied while cad sits at zero.
        assert!(!is_ready(store.get(gated).unwrap(), &store, &graph));
        assert!(!is_ready(store.get(plain).unwrap(), &store, &graph));

        // Latching the gate frees only the gated downstream.
        store.update_progress(&graph, &mut ledger, cad, 0.45).unwrap();
        assert!(is_ready(store.get(gated).unwrap(), &store, &graph));
        assert!(!is_ready(store.get(plain).unwrap(), &store, &graph));

        // Work completion frees the ungated one too.
        store.update_progress(&graph, &mut ledger, cad, 1.0).unwrap();
        assert!(is_ready(store.get(plain).unwrap(), &store, &graph));
    }

    #[test]
    fn no_upstreams_means_ready() {
        let mut store = TaskStore::new();
        let mut graph = DependencyGraph::new();
        let id = store.create(TaskSpec::forward("root", 0.5)).unwrap();
        graph.register(id);
        assert!(is_ready(store.get(id).unwrap(), &store, &graph));
    }
}
