//! Mutating operations on the engine. Each takes the write lock for the
//! duration of one validated state change.

use flowline_core::{LifecycleState, Result, TaskId, TaskSpec};

use crate::graph::EdgeKind;
use crate::lifecycle::{ProgressOutcome, TransitionOutcome, VolatilityShift};

use super::core::Engine;

impl Engine {
    /// Validates and inserts a new pending task.
    pub fn create_task(&self, spec: TaskSpec) -> Result<TaskId> {
        self.write().create_task(spec)
    }

    /// Links two tasks with an ungated dependency edge.
    pub fn link(
        &self,
        upstream: TaskId,
        downstream: TaskId,
        weight: f64,
        kind: EdgeKind,
    ) -> Result<()> {
        self.write().link(upstream, downstream, weight, kind, None)
    }

    /// Links a requires edge that opens once `label` latches on the
    /// upstream task, instead of waiting for its work to complete.
    pub fn link_at_milestone(
        &self,
        upstream: TaskId,
        downstream: TaskId,
        weight: f64,
        label: impl Into<String>,
    ) -> Result<()> {
        self.write()
            .link(upstream, downstream, weight, EdgeKind::Requires, Some(label.into()))
    }

    /// Applies an explicit lifecycle transition.
    pub fn transition(&self, id: TaskId, target: LifecycleState) -> Result<TransitionOutcome> {
        self.write().transition(id, target)
    }

    /// Sets fractional progress, latching crossed milestones and routing
    /// completions.
    pub fn update_progress(&self, id: TaskId, value: f64) -> Result<ProgressOutcome> {
        self.write().update_progress(id, value)
    }

    /// Re-estimates a creation task's volatility.
    pub fn update_volatility(&self, id: TaskId, value: f64) -> Result<VolatilityShift> {
        self.write()
            .update_volatility(id, value, self.config.scrap_threshold)
    }

    /// Resets in-progress work downstream of a churned output.
    pub fn scrap_downstream(&self, id: TaskId) -> Result<Vec<TaskId>> {
        self.write().scrap_downstream(id)
    }
}
