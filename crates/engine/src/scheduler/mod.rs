//! The scheduling engine: shared state, operations and the tiered tick.

mod core;
mod ops;
mod state;
mod ticks;
mod types;


pub use self::core::Engine;
pub use state::ProjectState;
pub use types::{BacklogItem, StopTheLine, TickOutcome, TierAction};
