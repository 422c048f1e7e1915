//! Saved project images.
//!
//! A snapshot carries tasks, edges and the held risk entries. That is the
//! whole scheduler input, so restoring one reproduces the captured
//! project's tick behavior exactly. Restore re-validates everything it
//! touches; a tampered or hand-edited image is rejected with
//! [`flowline_core::Error::CorruptSnapshot`] rather than admitted into the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flowline_core::{Error, LifecycleState, Result, Task, TaskId};

use crate::graph::{DependencyGraph, Edge};
use crate::ledger::RiskLedger;
use crate::lifecycle::TaskStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub project: Uuid,
    pub captured_at: DateTime<Utc>,
}

/// One held contribution in the risk ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub task: TaskId,
    pub contribution: f64,
}

/// Serializable image of a whole project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub meta: SnapshotMeta,
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
    pub ledger: Vec<LedgerEntry>,
}

/// Captures the current project as a snapshot.
pub fn capture(
    project: Uuid,
    store: &TaskStore,
    graph: &DependencyGraph,
    ledger: &RiskLedger,
) -> ProjectSnapshot {
    ProjectSnapshot {
        meta: SnapshotMeta {
            project,
            captured_at: Utc::now(),
        },
        tasks: store.iter().cloned().collect(),
        edges: graph.edges().to_vec(),
        ledger: ledger
            .entries()
            .map(|(task, contribution)| LedgerEntry { task, contribution })
            .collect(),
    }
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::CorruptSnapshot(msg.into())
}

/// Checks a restored task in isolation: value ranges, discipline shape,
/// milestone declarations, and state/progress coherence.
pub(crate) fn validate_restored_task(task: &Task) -> Result<()> {
    let id = task.id;
    if task.name.trim().is_empty() {
        return Err(corrupt(format!("{id}: empty name")));
    }
    if !task.volatility.is_finite() || !(0.0..=1.0).contains(&task.volatility) {
        return Err(corrupt(format!(
            "{id}: volatility {} out of range",
            task.volatility
        )));
    }
    if !task.progress.is_finite() || !(0.0..=1.0).contains(&task.progress) {
        return Err(corrupt(format!(
            "{id}: progress {} out of range",
            task.progress
        )));
    }
    if task.discipline.is_backward() {
        if task.volatility != 0.0 {
            return Err(corrupt(format!("{id}: validation task with volatility")));
        }
        if !task.milestones.is_empty() {
            return Err(corrupt(format!("{id}: validation task with milestones")));
        }
        if task.state == LifecycleState::WaitingForValidation {
            return Err(corrupt(format!(
                "{id}: validation tasks never wait for validation"
            )));
        }
    }
    let mut last = 0.0;
    for (i, m) in task.milestones.iter().enumerate() {
        if !m.threshold.is_finite() || m.threshold <= 0.0 || m.threshold > 1.0 {
            return Err(corrupt(format!(
                "{id}: milestone '{}' threshold {} out of range",
                m.label, m.threshold
            )));
        }
        if m.threshold <= last {
            return Err(corrupt(format!("{id}: milestone thresholds out of order")));
        }
        last = m.threshold;
        if m.label.trim().is_empty() {
            return Err(corrupt(format!("{id}: milestone with empty label")));
        }
        if task.milestones[..i].iter().any(|p| p.label == m.label) {
            return Err(corrupt(format!("{id}: duplicate milestone '{}'", m.label)));
        }
        // A threshold at or below current progress must have latched on the
        // way up; the reverse (latched above progress) is a legal leftover
        // of an ordinary decrease.
        if m.threshold <= task.progress && !m.reached {
            return Err(corrupt(format!(
                "{id}: milestone '{}' passed but not latched",
                m.label
            )));
        }
    }
    match task.state {
        LifecycleState::Pending if task.progress != 0.0 => {
            Err(corrupt(format!("{id}: pending task with progress")))
        }
        LifecycleState::InProgress if task.progress >= 1.0 => {
            Err(corrupt(format!("{id}: in-progress task at full progress")))
        }
        LifecycleState::WaitingForValidation | LifecycleState::Done
            if task.progress != 1.0 =>
        {
            Err(corrupt(format!("{id}: completed task below full progress")))
        }
        _ => Ok(()),
    }
}

/// Cross-structure checks after tasks and edges are rebuilt: the ledger
/// matches the waiting set exactly, waiting tasks have validators, and no
/// done output left a validator open.
pub(crate) fn validate_consistency(
    store: &TaskStore,
    graph: &DependencyGraph,
    entries: &[LedgerEntry],
) -> Result<()> {
    use std::collections::HashSet;

    let waiting: HashSet<TaskId> = store
        .iter()
        .filter(|t| t.state == LifecycleState::WaitingForValidation)
        .map(|t| t.id)
        .collect();
    let mut held = HashSet::new();
    for entry in entries {
        if !entry.contribution.is_finite() || entry.contribution < 0.0 {
            return Err(corrupt(format!(
                "ledger contribution {} for {} out of range",
                entry.contribution, entry.task
            )));
        }
        if !held.insert(entry.task) {
            return Err(corrupt(format!("duplicate ledger entry for {}", entry.task)));
        }
        if !waiting.contains(&entry.task) {
            return Err(corrupt(format!(
                "ledger entry for {} which is not waiting for validation",
                entry.task
            )));
        }
    }
    for id in &waiting {
        if !held.contains(id) {
            return Err(corrupt(format!("{id} is waiting but holds no ledger entry")));
        }
    }
    for task in store.iter() {
        match task.state {
            LifecycleState::WaitingForValidation => {
                if graph.validators_of(task.id).next().is_none() {
                    return Err(corrupt(format!(
                        "{} is waiting but declares no validators",
                        task.id
                    )));
                }
            }
            LifecycleState::Done if task.discipline.is_forward() => {
                let open = graph.validators_of(task.id).find(|v| {
                    !store
                        .task(*v)
                        .map(|t| t.state.is_terminal())
                        .unwrap_or(false)
                });
                if let Some(v) = open {
                    return Err(corrupt(format!(
                        "{} is done but validator {v} is still open",
                        task.id
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
