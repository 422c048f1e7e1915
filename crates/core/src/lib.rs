pub mod config;
pub mod error;
pub mod task;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use task::{Discipline, LifecycleState, Milestone, Task, TaskId, TaskSpec};
