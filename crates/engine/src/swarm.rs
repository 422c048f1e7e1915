//! Swarming advice for a saturated risk inventory.
//!
//! When the ledger blocks forward admission, the fastest way to reopen it
//! is finishing validation work. The advisor picks the open validator whose
//! completion frees the most downstream work and, when idle forward
//! capacity exists, names a task that could lend a hand.

use flowline_core::{LifecycleState, TaskId};

use crate::graph::{DependencyGraph, Edge, EdgeKind};
use crate::ledger::RiskLedger;
use crate::lifecycle::TaskStore;

/// A recommendation to redirect forward capacity onto validation work.
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmRecommendation {
    /// Open validation task to accelerate.
    pub target: TaskId,
    pub target_name: String,
    /// The waiting forward task whose held risk motivated the pick.
    pub validates: TaskId,
    pub validates_name: String,
    /// Ledger contribution held open by `validates`.
    pub held_risk: f64,
    /// Transitive block count of `target`.
    pub unblocks: usize,
    /// Idle forward task that could lend capacity, if any.
    pub supporter: Option<TaskId>,
    /// One-line suggestion for the host to surface.
    pub note: String,
}

impl SwarmRecommendation {
    /// The advisory supports edge this recommendation stands for. Handed to
    /// hosts for display only; the graph rejects it on insertion.
    pub fn proposed_support(&self) -> Option<Edge> {
        self.supporter
            .map(|s| Edge::new(s, self.target, 1.0, EdgeKind::Supports))
    }
}

/// Picks the open validator releasing the most downstream work: widest
/// transitive block count first, then the largest held contribution among
/// the tasks it validates, then the lowest id. Returns `None` when nothing
/// in the ledger has an open validator.
pub fn advise(
    store: &TaskStore,
    graph: &DependencyGraph,
    ledger: &RiskLedger,
) -> Option<SwarmRecommendation> {
    struct Candidate {
        target: TaskId,
        unblocks: usize,
        held: f64,
        validates: TaskId,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (waiting, held) in ledger.entries() {
        for validator in graph.validators_of(waiting) {
            let Some(vtask) = store.task(validator) else {
                continue;
            };
            if vtask.state.is_terminal() {
                continue;
            }
            match candidates.iter_mut().find(|c| c.target == validator) {
                Some(c) if held > c.held => {
                    c.held = held;
                    c.validates = waiting;
                }
                Some(_) => {}
                None => candidates.push(Candidate {
                    target: validator,
                    unblocks: graph.transitive_block_count(validator),
                    held,
                    validates: waiting,
                }),
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.unblocks
            .cmp(&a.unblocks)
            .then(b.held.total_cmp(&a.held))
            .then(a.target.cmp(&b.target))
    });
    let best = candidates.into_iter().next()?;

    let supporter = store
        .iter()
        .find(|t| t.discipline.is_forward() && t.state == LifecycleState::Pending)
        .map(|t| t.id);
    let target_name = store.task(best.target)?.name.clone();
    let validates_name = store.task(best.validates)?.name.clone();
    let note = match supporter {
        Some(s) => format!(
            "redirect {s} to accelerate '{target_name}' (validates '{validates_name}')"
        ),
        None => format!("accelerate '{target_name}' (validates '{validates_name}')"),
    };
    Some(SwarmRecommendation {
        target: best.target,
        target_name,
        validates: best.validates,
        validates_name,
        held_risk: best.held,
        unblocks: best.unblocks,
        supporter,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::TaskSpec;

    struct Rig {
        store: TaskStore,
        graph: DependencyGraph,
        ledger: RiskLedger,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                store: TaskStore::new(),
                graph: DependencyGraph::new(),
                ledger: RiskLedger::new(),
            }
        }

        fn forward(&mut self, name: &str, volatility: f64) -> TaskId {
            let id = self.store.create(TaskSpec::forward(name, volatility)).unwrap();
            self.graph.register(id);
            id
        }

        fn backward(&mut self, name: &str) -> TaskId {
            let id = self.store.create(TaskSpec::backward(name)).unwrap();
            self.graph.register(id);
            id
        }

        fn validates(&mut self, validator: TaskId, output: TaskId) {
            self.graph
                .add_edge(Edge::new(validator, output, 1.0, EdgeKind::Validates))
                .unwrap();
        }

        fn wait_for_validation(&mut self, id: TaskId) {
            self.store
                .update_progress(&self.graph, &mut self.ledger, id, 1.0)
                .unwrap();
            assert_eq!(
                self.store.get(id).unwrap().state,
                LifecycleState::WaitingForValidation
            );
        }
    }

    #[test]
    fn no_held_risk_means_no_advice() {
        let mut rig = Rig::new();
        rig.forward("hull", 0.5);
        assert_eq!(advise(&rig.store, &rig.graph, &rig.ledger), None);
    }

    #[test]
    fn picks_the_validator_that_unblocks_the_most() {
        let mut rig = Rig::new();
        let hull = rig.forward("hull", 0.6);
        let deck = rig.forward("deck", 0.4);
        let hull_check = rig.backward("hull check");
        let deck_check = rig.backward("deck check");
        rig.validates(hull_check, hull);
        rig.validates(deck_check, deck);
        // hull_check additionally blocks two follow-ups through hull.
        let trim = rig.forward("trim", 0.1);
        let paint = rig.forward("paint", 0.1);
        rig.graph.add_edge(Edge::new(hull, trim, 1.0, EdgeKind::Requires)).unwrap();
        rig.graph.add_edge(Edge::new(hull, paint, 1.0, EdgeKind::Requires)).unwrap();
        rig.wait_for_validation(hull);
        rig.wait_for_validation(deck);

        let advice = advise(&rig.store, &rig.graph, &rig.ledger).unwrap();
        assert_eq!(advice.target, hull_check);
        assert_eq!(advice.validates, hull);
        assert_eq!(advice.held_risk, 0.6);
        assert!(advice.unblocks >= 3);
    }

    #[test]
    fn block_count_ties_break_by_held_risk_then_id() {
        let mut rig = Rig::new();
        let a = rig.forward("a", 0.3);
        let b = rig.forward("b", 0.7);
        let check_a = rig.backward("check a");
        let check_b = rig.backward("check b");
        rig.validates(check_a, a);
        rig.validates(check_b, b);
        rig.wait_for_validation(a);
        rig.wait_for_validation(b);

        let advice = advise(&rig.store, &rig.graph, &rig.ledger).unwrap();
        assert_eq!(advice.target, check_b);
        assert_eq!(advice.held_risk, 0.7);
    }

    #[test]
    fn done_validators_are_never_targets() {
        let mut rig = Rig::new();
        let hull = rig.forward("hull", 0.6);
        let done_check = rig.backward("fit check");
        let open_check = rig.backward("stress check");
        rig.validates(done_check, hull);
        rig.validates(open_check, hull);
        rig.store
            .transition(&rig.graph, &mut rig.ledger, done_check, LifecycleState::InProgress)
            .unwrap();
        rig.store
            .update_progress(&rig.graph, &mut rig.ledger, done_check, 1.0)
            .unwrap();
        rig.wait_for_validation(hull);

        let advice = advise(&rig.store, &rig.graph, &rig.ledger).unwrap();
        assert_eq!(advice.target, open_check);
    }

    #[test]
    fn supporter_is_the_first_idle_forward_task() {
        let mut rig = Rig::new();
        let hull = rig.forward("hull", 0.6);
        let check = rig.backward("hull check");
        rig.validates(check, hull);
        rig.wait_for_validation(hull);
        let idle = rig.forward("future deck", 0.2);

        let advice = advise(&rig.store, &rig.graph, &rig.ledger).unwrap();
        assert_eq!(advice.supporter, Some(idle));
        let support = advice.proposed_support().unwrap();
        assert_eq!((support.upstream, support.downstream), (idle, check));
        assert_eq!(support.kind, EdgeKind::Supports);
        // Advisory only. The graph refuses to persist it.
        assert!(rig.graph.add_edge(support).is_err());
    }

    #[test]
    fn no_supporter_when_no_forward_capacity_is_idle() {
        let mut rig = Rig::new();
        let hull = rig.forward("hull", 0.6);
        let check = rig.backward("hull check");
        rig.validates(check, hull);
        rig.wait_for_validation(hull);

        let advice = advise(&rig.store, &rig.graph, &rig.ledger).unwrap();
        assert_eq!(advice.supporter, None);
        assert_eq!(advice.proposed_support(), None);
    }
}
