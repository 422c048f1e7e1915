//! Composed project state: tasks, dependency graph and risk ledger.
//!
//! Operations that span more than one structure live here, so callers can
//! never observe tasks and ledger out of step.

use tracing::{debug, info};
use uuid::Uuid;

use flowline_core::{EngineConfig, Error, LifecycleState, Result, TaskId, TaskSpec};

use crate::graph::{DependencyGraph, Edge, EdgeKind};
use crate::ledger::{InventoryStatus, RiskLedger};
use crate::lifecycle::{
    CompletionStatus, ProgressOutcome, TaskStore, TransitionOutcome, VolatilityShift,
};
use crate::milestone;
use crate::ranker::{self, ForwardCandidate};
use crate::risk::{self, RiskGate};
use crate::snapshot::{self, ProjectSnapshot};
use crate::swarm::{self, SwarmRecommendation};

use super::types::StopTheLine;

#[derive(Debug)]
pub struct ProjectState {
    project: Uuid,
    tasks: TaskStore,
    graph: DependencyGraph,
    ledger: RiskLedger,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectState {
    pub fn new() -> Self {
        Self {
            project: Uuid::new_v4(),
            tasks: TaskStore::new(),
            graph: DependencyGraph::new(),
            ledger: RiskLedger::new(),
        }
    }

    pub fn project(&self) -> Uuid {
        self.project
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &RiskLedger {
        &self.ledger
    }

    pub fn completion(&self) -> CompletionStatus {
        self.tasks.completion()
    }

    pub fn inventory(&self, config: &EngineConfig) -> InventoryStatus {
        self.ledger.status(config.max_inventory)
    }

    pub fn is_ready(&self, id: TaskId) -> Result<bool> {
        let task = self.tasks.get(id)?;
        Ok(milestone::is_ready(task, &self.tasks, &self.graph))
    }

    // ── Mutations ───────────────────────────────────────────────────

    pub fn create_task(&mut self, spec: TaskSpec) -> Result<TaskId> {
        let id = self.tasks.create(spec)?;
        self.graph.register(id);
        Ok(id)
    }

    /// Validates and inserts a dependency edge.
    ///
    /// Shape rules: a requires upstream must be a creation task; a
    /// validates edge runs from a validation task to the creation output it
    /// signs off; supports edges never persist. A gate label must be
    /// declared by the upstream task.
    pub fn link(
        &mut self,
        upstream: TaskId,
        downstream: TaskId,
        weight: f64,
        kind: EdgeKind,
        gate: Option<String>,
    ) -> Result<()> {
        let up = self
            .tasks
            .task(upstream)
            .ok_or(Error::DanglingReference(upstream))?;
        let down = self
            .tasks
            .task(downstream)
            .ok_or(Error::DanglingReference(downstream))?;
        match kind {
            EdgeKind::Supports => {
                return Err(Error::InvalidLink(
                    "supports edges are advisory-only and are never persisted".into(),
                ));
            }
            EdgeKind::Requires => {
                if up.discipline.is_backward() {
                    return Err(Error::InvalidLink(format!(
                        "{upstream} is a validation task and cannot feed a requires edge"
                    )));
                }
                if let Some(label) = &gate {
                    if !up.has_milestone(label) {
                        return Err(Error::UnknownMilestone {
                            task: upstream,
                            label: label.clone(),
                        });
                    }
                }
            }
            EdgeKind::Validates => {
                if up.discipline.is_forward() {
                    return Err(Error::InvalidLink(format!(
                        "{upstream} is a creation task and cannot validate"
                    )));
                }
                if down.discipline.is_backward() {
                    return Err(Error::InvalidLink(format!(
                        "{downstream} is a validation task and has no output to validate"
                    )));
                }
            }
        }
        let mut edge = Edge::new(upstream, downstream, weight, kind);
        edge.gate = gate;
        self.graph.add_edge(edge)?;
        info!("linked {} -[{}]-> {} (weight {:.2})", upstream, kind, downstream, weight);
        Ok(())
    }

    pub fn transition(
        &mut self,
        id: TaskId,
        target: LifecycleState,
    ) -> Result<TransitionOutcome> {
        self.tasks.transition(&self.graph, &mut self.ledger, id, target)
    }

    pub fn update_progress(&mut self, id: TaskId, value: f64) -> Result<ProgressOutcome> {
        self.tasks
            .update_progress(&self.graph, &mut self.ledger, id, value)
    }

    pub fn update_volatility(
        &mut self,
        id: TaskId,
        value: f64,
        scrap_threshold: f64,
    ) -> Result<VolatilityShift> {
        self.tasks
            .update_volatility(&self.graph, id, value, scrap_threshold)
    }

    pub fn scrap_downstream(&mut self, id: TaskId) -> Result<Vec<TaskId>> {
        self.tasks.scrap_downstream(&self.graph, id)
    }

    // ── Tick evaluation ─────────────────────────────────────────────

    /// Highest-impact ready validation task currently in progress, if any.
    pub fn stop_the_line(&self) -> Option<StopTheLine> {
        let mut best: Option<StopTheLine> = None;
        for task in self.tasks.iter() {
            if !task.discipline.is_backward() || task.state != LifecycleState::InProgress {
                continue;
            }
            if !milestone::is_ready(task, &self.tasks, &self.graph) {
                continue;
            }
            let unblocks = self.graph.transitive_block_count(task.id);
            let better = match &best {
                None => true,
                Some(b) => unblocks > b.unblocks || (unblocks == b.unblocks && task.id < b.task),
            };
            if better {
                best = Some(StopTheLine {
                    task: task.id,
                    name: task.name.clone(),
                    unblocks,
                });
            }
        }
        best
    }

    /// Ready pending creation tasks, scored and split at the risk gate.
    /// Returns the ranked admission queue and the held-back candidates.
    pub fn forward_queue(
        &self,
        config: &EngineConfig,
    ) -> (Vec<ForwardCandidate>, Vec<ForwardCandidate>) {
        let mut admitted = Vec::new();
        let mut held = Vec::new();
        for task in self.tasks.iter() {
            if !task.discipline.is_forward() || task.state != LifecycleState::Pending {
                continue;
            }
            if !milestone::is_ready(task, &self.tasks, &self.graph) {
                continue;
            }
            let score = risk::propagated_risk(task.id, &self.tasks, &self.graph);
            let gate = risk::classify(score, config);
            let candidate = ForwardCandidate {
                task: task.id,
                name: task.name.clone(),
                risk: score,
                gate,
                unblocks: self.graph.transitive_block_count(task.id),
            };
            if gate == RiskGate::Hold {
                debug!(
                    "{} held at the risk gate (score {:.2})",
                    candidate.task, candidate.risk
                );
                held.push(candidate);
            } else {
                admitted.push(candidate);
            }
        }
        (ranker::rank(admitted), held)
    }

    pub fn swarm(&self) -> Option<SwarmRecommendation> {
        swarm::advise(&self.tasks, &self.graph, &self.ledger)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn capture(&self) -> ProjectSnapshot {
        snapshot::capture(self.project, &self.tasks, &self.graph, &self.ledger)
    }

    /// Rebuilds a project from a snapshot through the same validation the
    /// live paths use. Any rejected piece fails the whole restore.
    pub fn restore(image: ProjectSnapshot) -> Result<Self> {
        let mut state = Self {
            project: image.meta.project,
            tasks: TaskStore::new(),
            graph: DependencyGraph::new(),
            ledger: RiskLedger::new(),
        };
        for task in &image.tasks {
            snapshot::validate_restored_task(task)?;
        }
        for task in image.tasks {
            let id = task.id;
            state
                .tasks
                .insert_existing(task)
                .map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
            state.graph.register(id);
        }
        for edge in &image.edges {
            state
                .link(
                    edge.upstream,
                    edge.downstream,
                    edge.weight,
                    edge.kind,
                    edge.gate.clone(),
                )
                .map_err(|e| {
                    Error::CorruptSnapshot(format!(
                        "edge {} -> {}: {e}",
                        edge.upstream, edge.downstream
                    ))
                })?;
        }
        snapshot::validate_consistency(&state.tasks, &state.graph, &image.ledger)?;
        for entry in &image.ledger {
            state.ledger.add(entry.task, entry.contribution);
        }
        info!(
            "restored project {} ({} tasks, {} edges, {:.2} risk held)",
            state.project,
            state.tasks.len(),
            state.graph.edge_count(),
            state.ledger.current()
        );
        Ok(state)
    }
}
