//! The tiered tick.

use std::sync::atomic::Ordering;

use tracing::{debug, info};

use super::core::Engine;
use super::types::{BacklogItem, TickOutcome, TierAction};

impl Engine {
    /// Takes one scheduling decision over a consistent view of the project.
    ///
    /// Tier one: a ready validation task sitting in progress stops the
    /// line. Tier two: hand out ready creation work, unless the risk
    /// inventory is saturated. Tier three: swarm validation when saturated;
    /// otherwise surface an infrastructure backlog item; otherwise report
    /// that nothing is available.
    ///
    /// Reading state never mutates it: ticking twice without intervening
    /// writes yields the same action.
    pub fn tick(&self) -> TickOutcome {
        let state = self.read();
        let seq = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let inventory = state.inventory(&self.config);

        let action = if let Some(stop) = state.stop_the_line() {
            TierAction::StopTheLine(stop)
        } else if !inventory.saturated {
            let (queue, held) = state.forward_queue(&self.config);
            if queue.is_empty() {
                if !held.is_empty() {
                    debug!(
                        "tick {}: {} ready task(s) held at the risk gate",
                        seq,
                        held.len()
                    );
                }
                self.fallback(seq)
            } else {
                TierAction::ForwardQueue { queue, held }
            }
        } else {
            match state.swarm() {
                Some(recommendation) => TierAction::Swarm(recommendation),
                None => self.fallback(seq),
            }
        };

        info!("tick {}: {} (inventory {})", seq, action.label(), inventory);
        TickOutcome {
            seq,
            inventory,
            action,
        }
    }

    /// Rotates through the configured infrastructure backlog by tick
    /// sequence, or reports no action when the backlog is empty.
    fn fallback(&self, seq: u64) -> TierAction {
        let backlog = &self.config.infrastructure_backlog;
        if backlog.is_empty() {
            return TierAction::NoActionAvailable;
        }
        let index = ((seq - 1) as usize) % backlog.len();
        TierAction::Infrastructure(BacklogItem {
            index,
            label: backlog[index].clone(),
        })
    }
}
