//! Risk-governed scheduling for two-discipline pipelines.
//!
//! Projects mix creation tasks, which produce outputs, with validation
//! tasks, which sign those outputs off. The engine tracks both through a
//! shared lifecycle, scores ready work by the volatility it inherits from
//! upstream, keeps unvalidated risk in a bounded inventory, and answers
//! "what should happen right now" through [`Engine::tick`].

pub mod graph;
pub mod ledger;
pub mod lifecycle;
pub mod milestone;
pub mod ranker;
pub mod risk;
pub mod scheduler;
pub mod snapshot;
pub mod swarm;

pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use ledger::{InventoryStatus, RiskLedger};
pub use lifecycle::{
    CompletionStatus, ProgressOutcome, TaskStore, TransitionOutcome, VolatilityShift,
};
pub use ranker::ForwardCandidate;
pub use risk::RiskGate;
pub use scheduler::{BacklogItem, Engine, ProjectState, StopTheLine, TickOutcome, TierAction};
pub use snapshot::{LedgerEntry, ProjectSnapshot, SnapshotMeta};
pub use swarm::SwarmRecommendation;
