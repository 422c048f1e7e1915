//! Bottleneck-first ordering of the ready forward queue.

use flowline_core::TaskId;

use crate::risk::RiskGate;

/// A ready forward task admitted to the queue, scored for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardCandidate {
    pub task: TaskId,
    pub name: String,
    /// Propagated risk inherited from requires upstreams.
    pub risk: f64,
    pub gate: RiskGate,
    /// Distinct downstream tasks this one transitively blocks.
    pub unblocks: usize,
}

/// Orders candidates for hand-out: start before tentative, widest
/// transitive block count first, ties broken by ascending id. The ordering
/// is total, so equal inputs always produce the same queue.
pub fn rank(mut candidates: Vec<ForwardCandidate>) -> Vec<ForwardCandidate> {
    candidates.sort_by(|a, b| {
        a.gate
            .cmp(&b.gate)
            .then(b.unblocks.cmp(&a.unblocks))
            .then(a.task.cmp(&b.task))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, gate: RiskGate, unblocks: usize) -> ForwardCandidate {
        ForwardCandidate {
            task: TaskId::new(id),
            name: format!("task {id}"),
            risk: 0.0,
            gate,
            unblocks,
        }
    }

    fn ids(queue: &[ForwardCandidate]) -> Vec<u64> {
        queue.iter().map(|c| c.task.value()).collect()
    }

    #[test]
    fn start_always_precedes_tentative() {
        let queue = rank(vec![
            candidate(1, RiskGate::Tentative, 10),
            candidate(2, RiskGate::Start, 0),
        ]);
        assert_eq!(ids(&queue), vec![2, 1]);
    }

    #[test]
    fn wider_block_counts_come_first() {
        let queue = rank(vec![
            candidate(1, RiskGate::Start, 1),
            candidate(2, RiskGate::Start, 5),
            candidate(3, RiskGate::Start, 3),
        ]);
        assert_eq!(ids(&queue), vec![2, 3, 1]);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let queue = rank(vec![
            candidate(9, RiskGate::Start, 2),
            candidate(4, RiskGate::Start, 2),
            candidate(7, RiskGate::Start, 2),
        ]);
        assert_eq!(ids(&queue), vec![4, 7, 9]);
    }

    #[test]
    fn empty_queue_stays_empty() {
        assert!(rank(Vec::new()).is_empty());
    }
}
