use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unique task identifier. Allocated sequentially by the engine, so the
/// ascending order used for ranking tie-breaks is the creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        TaskId(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Which side of the pipeline a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Creation/fabrication work. Produces risk inventory while unvalidated.
    Forward,
    /// Validation work. Clears risk inventory on completion.
    Backward,
}

impl Discipline {
    pub fn is_forward(&self) -> bool {
        matches!(self, Discipline::Forward)
    }

    pub fn is_backward(&self) -> bool {
        matches!(self, Discipline::Backward)
    }
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::Forward => write!(f, "forward"),
            Discipline::Backward => write!(f, "backward"),
        }
    }
}

/// Lifecycle state shared by both disciplines. Not every transition is
/// available to every discipline; the lifecycle module enforces the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    InProgress,
    /// Forward-only: work complete, output not yet validated.
    WaitingForValidation,
    Done,
}

impl LifecycleState {
    /// Terminal state, no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Done)
    }

    /// The work itself is finished, whether or not validation has cleared.
    /// This is the readiness notion for ungated prerequisites: a downstream
    /// task may start once the upstream output exists.
    pub fn is_work_complete(self) -> bool {
        matches!(
            self,
            LifecycleState::WaitingForValidation | LifecycleState::Done
        )
    }

    /// Where a task lands when its work completes (progress reaches 1.0).
    pub fn completion_target(discipline: Discipline, has_validators: bool) -> LifecycleState {
        match discipline {
            Discipline::Backward => LifecycleState::Done,
            Discipline::Forward if has_validators => LifecycleState::WaitingForValidation,
            Discipline::Forward => LifecycleState::Done,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Pending => write!(f, "pending"),
            LifecycleState::InProgress => write!(f, "in_progress"),
            LifecycleState::WaitingForValidation => write!(f, "waiting_for_validation"),
            LifecycleState::Done => write!(f, "done"),
        }
    }
}

/// A declared partial-completion point on a forward task. Crossing it can
/// unlock downstream readiness before the task itself finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Fractional progress at which the milestone triggers, in (0, 1].
    pub threshold: f64,
    /// Label referenced by gated dependency edges. Unique per task.
    pub label: String,
    /// Sticky latch: survives ordinary progress decreases, cleared only by
    /// a downstream scrap.
    pub reached: bool,
}

impl Milestone {
    pub fn new(threshold: f64, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
            reached: false,
        }
    }
}

/// A unit of work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub discipline: Discipline,
    pub state: LifecycleState,
    /// Fractional completion, 0.0–1.0.
    pub progress: f64,
    /// Instability estimate, 0.0 (stable) – 1.0 (very volatile).
    /// Always 0.0 for backward tasks.
    pub volatility: f64,
    pub milestones: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a task from a validated spec. Callers must run
    /// [`TaskSpec::validate`] first; the engine's create path does.
    pub fn from_spec(id: TaskId, spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: spec.name,
            discipline: spec.discipline,
            state: LifecycleState::Pending,
            progress: 0.0,
            volatility: spec.volatility,
            milestones: spec
                .milestones
                .into_iter()
                .map(|(threshold, label)| Milestone::new(threshold, label))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn milestone(&self, label: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.label == label)
    }

    pub fn has_milestone(&self, label: &str) -> bool {
        self.milestone(label).is_some()
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Validated construction input for a task. Malformed specs are rejected
/// synchronously; nothing is inserted on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub discipline: Discipline,
    #[serde(default)]
    pub volatility: f64,
    /// (threshold, label) pairs, strictly ascending thresholds.
    #[serde(default)]
    pub milestones: Vec<(f64, String)>,
}

impl TaskSpec {
    pub fn forward(name: impl Into<String>, volatility: f64) -> Self {
        Self {
            name: name.into(),
            discipline: Discipline::Forward,
            volatility,
            milestones: Vec::new(),
        }
    }

    pub fn backward(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discipline: Discipline::Backward,
            volatility: 0.0,
            milestones: Vec::new(),
        }
    }

    pub fn with_milestone(mut self, threshold: f64, label: impl Into<String>) -> Self {
        self.milestones.push((threshold, label.into()));
        self
    }

    /// Reject malformed combinations before any state is touched.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidTask("task name must not be empty".into()));
        }
        if !self.volatility.is_finite() || !(0.0..=1.0).contains(&self.volatility) {
            return Err(Error::InvalidTask(format!(
                "volatility {} outside [0.0, 1.0]",
                self.volatility
            )));
        }
        if self.discipline.is_backward() {
            if self.volatility != 0.0 {
                return Err(Error::InvalidTask(
                    "backward tasks cannot carry volatility".into(),
                ));
            }
            if !self.milestones.is_empty() {
                return Err(Error::InvalidTask(
                    "backward tasks cannot declare milestones".into(),
                ));
            }
        }

        let mut previous = 0.0;
        for (threshold, label) in &self.milestones {
            if label.trim().is_empty() {
                return Err(Error::InvalidTask("milestone label must not be empty".into()));
            }
            if !threshold.is_finite() || *threshold <= 0.0 || *threshold > 1.0 {
                return Err(Error::InvalidTask(format!(
                    "milestone '{}' threshold {} outside (0.0, 1.0]",
                    label, threshold
                )));
            }
            if *threshold <= previous {
                return Err(Error::InvalidTask(format!(
                    "milestone '{}' threshold {} not strictly ascending",
                    label, threshold
                )));
            }
            previous = *threshold;
            if self.milestones.iter().filter(|(_, l)| l == label).count() > 1 {
                return Err(Error::InvalidTask(format!(
                    "duplicate milestone label '{}'",
                    label
                )));
            }
        }
        Ok(())
    }
}
