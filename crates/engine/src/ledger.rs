//! Risk inventory ledger.
//!
//! Tracks the risk held open by forward tasks that finished their work but
//! are still waiting for validation. A task's contribution is its volatility
//! snapshotted at the moment it entered the waiting state; the contribution
//! is released when validation clears it to done.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowline_core::TaskId;

/// Point-in-time view of the inventory against its configured budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub current: f64,
    pub max: f64,
    pub saturated: bool,
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} / {:.2}{}",
            self.current,
            self.max,
            if self.saturated { " (saturated)" } else { "" }
        )
    }
}

/// Per-task risk contributions, in entry order.
///
/// The running total is recomputed from the entries on every read instead of
/// being maintained incrementally, so it cannot drift. Entry bookkeeping is
/// driven entirely by lifecycle transitions; a double add or a release
/// without an entry is a defect in the caller and panics.
#[derive(Debug, Clone, Default)]
pub struct RiskLedger {
    contributions: IndexMap<TaskId, f64>,
}

impl RiskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `risk` against `task` on entry to waiting-for-validation.
    pub fn add(&mut self, task: TaskId, risk: f64) {
        assert!(
            risk.is_finite() && risk >= 0.0,
            "ledger contribution for {task} must be finite and non-negative, got {risk}"
        );
        let previous = self.contributions.insert(task, risk);
        assert!(
            previous.is_none(),
            "ledger already holds a contribution for {task}"
        );
        debug!("ledger: +{:.2} for {} (total {:.2})", risk, task, self.current());
    }

    /// Release the contribution recorded for `task` and return it.
    pub fn remove(&mut self, task: TaskId) -> f64 {
        let released = self
            .contributions
            .shift_remove(&task)
            .unwrap_or_else(|| panic!("ledger holds no contribution for {task}"));
        debug!(
            "ledger: -{:.2} for {} (total {:.2})",
            released,
            task,
            self.current()
        );
        released
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.contributions.contains_key(&task)
    }

    pub fn contribution(&self, task: TaskId) -> Option<f64> {
        self.contributions.get(&task).copied()
    }

    /// Exact sum of all held contributions.
    pub fn current(&self) -> f64 {
        self.contributions.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    /// Held contributions in entry order.
    pub fn entries(&self) -> impl Iterator<Item = (TaskId, f64)> + '_ {
        self.contributions.iter().map(|(id, risk)| (*id, *risk))
    }

    /// Inventory measured against `max`. Saturation is inclusive: a total
    /// exactly at the budget already blocks forward admission.
    pub fn status(&self, max: f64) -> InventoryStatus {
        let current = self.current();
        InventoryStatus {
            current,
            max,
            saturated: current >= max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TaskId {
        TaskId::new(n)
    }

    #[test]
    fn current_is_exact_sum_of_entries() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(1), 0.6);
        ledger.add(id(2), 0.6);
        assert_eq!(ledger.current(), 0.6 + 0.6);
        ledger.remove(id(1));
        assert_eq!(ledger.current(), 0.6);
        ledger.remove(id(2));
        assert_eq!(ledger.current(), 0.0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn saturation_is_inclusive_at_the_budget() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(1), 1.0);
        ledger.add(id(2), 1.5);
        let status = ledger.status(2.5);
        assert_eq!(status.current, 2.5);
        assert!(status.saturated);
        ledger.remove(id(2));
        assert!(!ledger.status(2.5).saturated);
    }

    #[test]
    fn remove_returns_the_recorded_contribution() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(7), 0.45);
        assert_eq!(ledger.remove(id(7)), 0.45);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(3), 0.1);
        ledger.add(id(1), 0.2);
        ledger.add(id(2), 0.3);
        let order: Vec<_> = ledger.entries().map(|(id, _)| id).collect();
        assert_eq!(order, vec![id(3), id(1), id(2)]);
    }

    #[test]
    #[should_panic(expected = "already holds a contribution")]
    fn double_add_panics() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(1), 0.2);
        ledger.add(id(1), 0.2);
    }

    #[test]
    #[should_panic(expected = "no contribution")]
    fn remove_without_entry_panics() {
        let mut ledger = RiskLedger::new();
        ledger.remove(id(1));
    }

    #[test]
    #[should_panic(expected = "finite and non-negative")]
    fn negative_contribution_panics() {
        let mut ledger = RiskLedger::new();
        ledger.add(id(1), -0.1);
    }
}
