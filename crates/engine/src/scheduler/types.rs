//! Tick outcome types handed to hosts.

use flowline_core::TaskId;

use crate::ledger::InventoryStatus;
use crate::ranker::ForwardCandidate;
use crate::swarm::SwarmRecommendation;

/// Tier-one alarm: a ready validation task is sitting in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTheLine {
    pub task: TaskId,
    pub name: String,
    /// Distinct downstream tasks waiting behind it.
    pub unblocks: usize,
}

/// A configured infrastructure backlog item, surfaced when no task work is
/// available.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogItem {
    pub index: usize,
    pub label: String,
}

/// What the scheduler wants done right now.
#[derive(Debug, Clone, PartialEq)]
pub enum TierAction {
    /// Finish this validation task before anything else.
    StopTheLine(StopTheLine),
    /// Hand out creation work in queue order. `held` lists ready tasks kept
    /// back by the risk gate, for reporting only.
    ForwardQueue {
        queue: Vec<ForwardCandidate>,
        held: Vec<ForwardCandidate>,
    },
    /// The risk inventory is saturated: accelerate validation instead of
    /// starting new work.
    Swarm(SwarmRecommendation),
    /// Nothing schedulable; chip away at the configured backlog.
    Infrastructure(BacklogItem),
    /// Nothing to do at all.
    NoActionAvailable,
}

impl TierAction {
    /// Short tag for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            TierAction::StopTheLine(_) => "stop-the-line",
            TierAction::ForwardQueue { .. } => "forward-queue",
            TierAction::Swarm(_) => "swarm",
            TierAction::Infrastructure(_) => "infrastructure",
            TierAction::NoActionAvailable => "no-action",
        }
    }
}

/// One scheduling decision over a consistent view of the project.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Monotone tick sequence number, starting at 1.
    pub seq: u64,
    pub inventory: InventoryStatus,
    pub action: TierAction,
}
