//! Engine facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;
use uuid::Uuid;

use flowline_core::{EngineConfig, Result, Task, TaskId};

use crate::graph::Edge;
use crate::ledger::InventoryStatus;
use crate::lifecycle::CompletionStatus;
use crate::snapshot::ProjectSnapshot;

use super::state::ProjectState;

/// Thread-safe scheduling engine for one project.
///
/// Tasks, graph and ledger sit behind a single lock, so every operation
/// observes a consistent project and every tick evaluates one atomic view.
/// The tick counter lives outside the lock.
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) state: RwLock<ProjectState>,
    pub(super) ticks: AtomicU64,
}

impl Engine {
    /// Creates an empty project under a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let state = ProjectState::new();
        info!(
            "engine up for project {} (max inventory {:.2})",
            state.project(),
            config.max_inventory
        );
        Ok(Self {
            config,
            state: RwLock::new(state),
            ticks: AtomicU64::new(0),
        })
    }

    /// Restores a captured project. The tick counter restarts at zero.
    pub fn restore(config: EngineConfig, image: ProjectSnapshot) -> Result<Self> {
        config.validate()?;
        let state = ProjectState::restore(image)?;
        Ok(Self {
            config,
            state: RwLock::new(state),
            ticks: AtomicU64::new(0),
        })
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, ProjectState> {
        self.state.read().expect("project state lock poisoned")
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, ProjectState> {
        self.state.write().expect("project state lock poisoned")
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn project(&self) -> Uuid {
        self.read().project()
    }

    /// Clone of one task.
    pub fn task(&self, id: TaskId) -> Result<Task> {
        self.read().tasks().get(id).cloned()
    }

    /// Clones of all tasks, in creation order.
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks().iter().cloned().collect()
    }

    /// Clones of all edges, in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        self.read().graph().edges().to_vec()
    }

    /// Whether every requires upstream of `id` is currently satisfied.
    pub fn is_ready(&self, id: TaskId) -> Result<bool> {
        self.read().is_ready(id)
    }

    pub fn completion(&self) -> CompletionStatus {
        self.read().completion()
    }

    pub fn inventory_status(&self) -> InventoryStatus {
        self.read().inventory(&self.config)
    }

    /// Number of ticks taken so far.
    pub fn ticks_taken(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Fast-forwards the tick counter when resuming a persisted project,
    /// so backlog rotation continues where the previous session stopped.
    pub fn resume_ticks(&self, taken: u64) {
        self.ticks.store(taken, Ordering::Relaxed);
    }

    /// Captures the project for persistence.
    pub fn snapshot(&self) -> ProjectSnapshot {
        self.read().capture()
    }
}
