use thiserror::Error;

use crate::task::{LifecycleState, TaskId};

/// Engine-wide error type. Every variant rejects a single operation at the
/// call boundary and leaves engine state untouched. Internal invariant
/// breaks (a negative ledger, a missing contribution) are defects and panic
/// instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("edge references unknown task {0}")]
    DanglingReference(TaskId),

    #[error("link {upstream} -> {downstream} would create a requires cycle")]
    CycleDetected { upstream: TaskId, downstream: TaskId },

    #[error("illegal transition for {task}: {from} -> {to} ({reason})")]
    IllegalTransition {
        task: TaskId,
        from: LifecycleState,
        to: LifecycleState,
        reason: String,
    },

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("task {task} declares no milestone '{label}'")]
    UnknownMilestone { task: TaskId, label: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;
