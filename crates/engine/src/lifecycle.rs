//! Task store and lifecycle transitions.
//!
//! The store is the only place task state changes. Every mutation keeps the
//! risk ledger in step with the lifecycle: entering waiting-for-validation
//! books the task's volatility, leaving it releases the same entry.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use flowline_core::{Error, LifecycleState, Result, Task, TaskId, TaskSpec};

use crate::graph::DependencyGraph;
use crate::ledger::RiskLedger;
use crate::milestone;

/// Result of an explicit transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied {
        from: LifecycleState,
        /// Where the task landed. May differ from the requested target when
        /// completion clears through validation in one step.
        to: LifecycleState,
        /// Other tasks auto-released from waiting-for-validation.
        released: Vec<TaskId>,
    },
    /// The request named the state the task is already in.
    NoOp,
}

/// Result of a progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    pub previous: f64,
    pub progress: f64,
    /// Milestone labels crossed by this update, in declaration order.
    pub crossed: Vec<String>,
    /// State the task moved to, if the update triggered a transition.
    pub transitioned: Option<LifecycleState>,
    /// Forward tasks auto-released when this update completed a validator.
    pub released: Vec<TaskId>,
}

/// Result of a volatility re-estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityShift {
    pub previous: f64,
    pub volatility: f64,
    /// In-progress downstream tasks a scrap would reset. Advisory only,
    /// present when the new estimate is at or above the scrap threshold.
    pub scrap_candidates: Option<Vec<TaskId>>,
}

/// Done-task count over both disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStatus {
    pub done: usize,
    pub total: usize,
}

impl CompletionStatus {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} done", self.done, self.total)
    }
}

/// Tasks in creation order, keyed by id.
#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: IndexMap<TaskId, Task>,
    next_id: u64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Validates and inserts a new pending task under the next free id.
    pub fn create(&mut self, spec: TaskSpec) -> Result<TaskId> {
        spec.validate()?;
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        let task = Task::from_spec(id, spec);
        info!("created {} '{}' ({})", id, task.name, task.discipline);
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Inserts a fully-formed task when restoring a saved project. The id
    /// counter advances past the restored id.
    pub(crate) fn insert_existing(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(Error::InvalidTask(format!("duplicate task id {}", task.id)));
        }
        self.next_id = self.next_id.max(task.id.value() + 1);
        self.tasks.insert(task.id, task);
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(Error::UnknownTask(id))
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(Error::UnknownTask(id))
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.values()
    }

    pub fn completion(&self) -> CompletionStatus {
        CompletionStatus {
            done: self.iter().filter(|t| t.state.is_terminal()).count(),
            total: self.len(),
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Applies an explicit lifecycle transition.
    ///
    /// Asking for the current state reports `NoOp`. Anything not reachable
    /// in one lifecycle step is an `IllegalTransition` and leaves the task
    /// untouched. Completing a task may land it past the requested target:
    /// a waiting task whose validators have already signed off clears
    /// through to done in the same call.
    pub fn transition(
        &mut self,
        graph: &DependencyGraph,
        ledger: &mut RiskLedger,
        id: TaskId,
        target: LifecycleState,
    ) -> Result<TransitionOutcome> {
        let (from, discipline) = {
            let task = self.get(id)?;
            (task.state, task.discipline)
        };
        if target == from {
            debug!("{}: already {}, nothing to do", id, from);
            return Ok(TransitionOutcome::NoOp);
        }
        use LifecycleState::*;
        match (from, target) {
            (Pending, InProgress) => {
                let task = self.get_mut(id)?;
                task.state = InProgress;
                task.touch();
                info!("{}: {} -> {}", id, from, target);
                Ok(TransitionOutcome::Applied {
                    from,
                    to: InProgress,
                    released: Vec::new(),
                })
            }
            (InProgress, WaitingForValidation) => {
                if discipline.is_backward() {
                    return Err(illegal(id, from, target, "validation work completes straight to done"));
                }
                if graph.validators_of(id).next().is_none() {
                    return Err(illegal(id, from, target, "no validators declared for this output"));
                }
                let (to, _, released) = self.complete(graph, ledger, id)?;
                Ok(TransitionOutcome::Applied { from, to, released })
            }
            (InProgress, Done) => {
                if discipline.is_forward() && graph.validators_of(id).next().is_some() {
                    return Err(illegal(id, from, target, "output must clear validation first"));
                }
                let (to, _, released) = self.complete(graph, ledger, id)?;
                Ok(TransitionOutcome::Applied { from, to, released })
            }
            (WaitingForValidation, Done) => {
                if !self.validators_done(graph, id) {
                    let open: Vec<String> = graph
                        .validators_of(id)
                        .filter(|v| !self.task(*v).map(|t| t.state.is_terminal()).unwrap_or(false))
                        .map(|v| v.to_string())
                        .collect();
                    return Err(illegal(
                        id,
                        from,
                        target,
                        format!("validators still open: {}", open.join(", ")),
                    ));
                }
                self.mark_released(ledger, id)?;
                Ok(TransitionOutcome::Applied {
                    from,
                    to: Done,
                    released: Vec::new(),
                })
            }
            (Done, _) => Err(illegal(id, from, target, "done is terminal")),
            (WaitingForValidation | InProgress, _) => {
                Err(illegal(id, from, target, "lifecycle never moves backward"))
            }
            (Pending, _) => Err(illegal(id, from, target, "work has not started")),
        }
    }

    /// Sets fractional progress.
    ///
    /// Movement above zero starts a pending task; reaching 1.0 completes the
    /// work and routes the task to its completion state. Crossed milestones
    /// latch. Decreases below a latched milestone keep the latch. Progress on
    /// a terminal task is rejected, as is pulling waiting work back open;
    /// re-reporting the completed value is a harmless no-op.
    pub fn update_progress(
        &mut self,
        graph: &DependencyGraph,
        ledger: &mut RiskLedger,
        id: TaskId,
        value: f64,
    ) -> Result<ProgressOutcome> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidTask(format!(
                "progress must lie in [0.0, 1.0], got {value}"
            )));
        }
        let (state, previous) = {
            let task = self.get(id)?;
            (task.state, task.progress)
        };
        match state {
            LifecycleState::Done | LifecycleState::WaitingForValidation if value == previous => {
                return Ok(ProgressOutcome {
                    previous,
                    progress: previous,
                    crossed: Vec::new(),
                    transitioned: None,
                    released: Vec::new(),
                });
            }
            LifecycleState::Done => {
                return Err(illegal(id, state, state, "done is terminal"))
            }
            LifecycleState::WaitingForValidation => {
                return Err(illegal(
                    id,
                    state,
                    LifecycleState::InProgress,
                    "completed work cannot be reopened",
                ));
            }
            _ => {}
        }

        let mut transitioned = None;
        if state == LifecycleState::Pending && value > 0.0 {
            let task = self.get_mut(id)?;
            task.state = LifecycleState::InProgress;
            info!("{}: pending -> in_progress at {:.2}", id, value);
            transitioned = Some(LifecycleState::InProgress);
        }

        if value >= 1.0 {
            let (to, crossed, released) = self.complete(graph, ledger, id)?;
            return Ok(ProgressOutcome {
                previous,
                progress: 1.0,
                crossed,
                transitioned: Some(to),
                released,
            });
        }

        let task = self.get_mut(id)?;
        let crossed = milestone::latch_crossings(&mut task.milestones, previous, value);
        task.progress = value;
        task.touch();
        if crossed.is_empty() {
            debug!("{}: progress {:.2} -> {:.2}", id, previous, value);
        } else {
            info!("{}: crossed {} at {:.2}", id, crossed.join(", "), value);
        }
        Ok(ProgressOutcome {
            previous,
            progress: value,
            crossed,
            transitioned,
            released: Vec::new(),
        })
    }

    /// Re-estimates a forward task's volatility.
    ///
    /// Allowed in any lifecycle state: a finished design can still be
    /// re-judged, and downstream risk reads pick the new value up
    /// immediately. A contribution already held in the ledger keeps its
    /// entry-time snapshot. At or above the scrap threshold the shift
    /// carries the in-progress downstream tasks a scrap would reset.
    pub fn update_volatility(
        &mut self,
        graph: &DependencyGraph,
        id: TaskId,
        value: f64,
        scrap_threshold: f64,
    ) -> Result<VolatilityShift> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidTask(format!(
                "volatility must lie in [0.0, 1.0], got {value}"
            )));
        }
        let task = self.get(id)?;
        if task.discipline.is_backward() {
            return Err(Error::InvalidTask(format!(
                "{id} is a validation task and carries no volatility"
            )));
        }
        let previous = task.volatility;
        let task = self.get_mut(id)?;
        task.volatility = value;
        task.touch();
        info!("{}: volatility {:.2} -> {:.2}", id, previous, value);

        let scrap_candidates = if value >= scrap_threshold {
            let candidates = self.scrap_candidates(graph, id);
            warn!(
                "{}: volatility {:.2} reached scrap threshold, {} in-progress downstream task(s) exposed",
                id,
                value,
                candidates.len()
            );
            Some(candidates)
        } else {
            None
        };
        Ok(VolatilityShift {
            previous,
            volatility: value,
            scrap_candidates,
        })
    }

    /// In-progress tasks downstream of `id` over requires edges, in
    /// breadth-first order. Exactly the set a scrap resets.
    pub fn scrap_candidates(&self, graph: &DependencyGraph, id: TaskId) -> Vec<TaskId> {
        graph
            .requires_descendants(id)
            .into_iter()
            .filter(|t| {
                self.task(*t)
                    .map(|t| t.state == LifecycleState::InProgress)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Resets every in-progress task downstream of `id` over requires
    /// edges: progress to zero, milestone latches cleared, state kept at
    /// in-progress. Pending, waiting and done tasks are left alone;
    /// completed work is never pulled back open.
    pub fn scrap_downstream(
        &mut self,
        graph: &DependencyGraph,
        id: TaskId,
    ) -> Result<Vec<TaskId>> {
        self.get(id)?;
        let reset = self.scrap_candidates(graph, id);
        for rid in &reset {
            let task = self.get_mut(*rid)?;
            task.progress = 0.0;
            milestone::clear_latches(&mut task.milestones);
            task.touch();
            info!("{}: reset by scrap of {}", rid, id);
        }
        if reset.is_empty() {
            debug!("scrap of {}: nothing in progress downstream", id);
        } else {
            warn!("scrap of {}: reset {} task(s)", id, reset.len());
        }
        Ok(reset)
    }

    // ── Completion plumbing ─────────────────────────────────────────

    /// Finishes the work on `id`: progress snaps to 1.0, remaining
    /// milestones latch, and the task routes to its completion state.
    /// Entering waiting-for-validation books the volatility into the
    /// ledger; if the validators have already signed off the task clears
    /// straight through. A completing validator releases every waiting
    /// task whose validator set is now done.
    ///
    /// Returns the final state, crossed labels, and released task ids.
    fn complete(
        &mut self,
        graph: &DependencyGraph,
        ledger: &mut RiskLedger,
        id: TaskId,
    ) -> Result<(LifecycleState, Vec<String>, Vec<TaskId>)> {
        let has_validators = graph.validators_of(id).next().is_some();
        let task = self.get_mut(id)?;
        let from = task.state;
        let old = task.progress;
        task.progress = 1.0;
        let crossed = milestone::latch_crossings(&mut task.milestones, old, 1.0);
        let target = LifecycleState::completion_target(task.discipline, has_validators);
        task.state = target;
        task.touch();
        let discipline = task.discipline;
        let volatility = task.volatility;
        info!("{}: {} -> {}", id, from, target);

        let mut released = Vec::new();
        let mut final_state = target;
        match target {
            LifecycleState::WaitingForValidation => {
                ledger.add(id, volatility);
                if self.validators_done(graph, id) {
                    self.mark_released(ledger, id)?;
                    final_state = LifecycleState::Done;
                }
            }
            LifecycleState::Done if discipline.is_backward() => {
                released = self.release_validated(graph, ledger, id)?;
            }
            _ => {}
        }
        Ok((final_state, crossed, released))
    }

    /// After validator `validator` completes, clears every forward task it
    /// validates whose full validator set is now done.
    fn release_validated(
        &mut self,
        graph: &DependencyGraph,
        ledger: &mut RiskLedger,
        validator: TaskId,
    ) -> Result<Vec<TaskId>> {
        let waiting: Vec<TaskId> = graph
            .validated_by(validator)
            .filter(|f| {
                self.task(*f)
                    .map(|t| t.state == LifecycleState::WaitingForValidation)
                    .unwrap_or(false)
            })
            .filter(|f| self.validators_done(graph, *f))
            .collect();
        for fid in &waiting {
            self.mark_released(ledger, *fid)?;
        }
        Ok(waiting)
    }

    /// Moves a waiting task to done and releases its ledger entry.
    fn mark_released(&mut self, ledger: &mut RiskLedger, id: TaskId) -> Result<()> {
        let held = ledger.remove(id);
        let task = self.get_mut(id)?;
        task.state = LifecycleState::Done;
        task.touch();
        info!("{}: validation cleared, releasing {:.2} risk", id, held);
        Ok(())
    }

    fn validators_done(&self, graph: &DependencyGraph, id: TaskId) -> bool {
        graph.validators_of(id).all(|v| {
            self.task(v)
                .map(|t| t.state.is_terminal())
                .unwrap_or(false)
        })
    }
}

fn illegal(
    task: TaskId,
    from: LifecycleState,
    to: LifecycleState,
    reason: impl Into<String>,
) -> Error {
    Error::IllegalTransition {
        task,
        from,
        to,
        reason: reason.into(),
    }
}
