use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowline_core::EngineConfig;
use flowline_engine::{Engine, ProjectSnapshot};

/// On-disk project file. The snapshot holds the full task graph and risk
/// ledger; the tick counter rides alongside so backlog rotation survives
/// restarts.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    pub snapshot: ProjectSnapshot,
    #[serde(default)]
    pub ticks_taken: u64,
}

/// Reads and writes the project file as pretty-printed JSON.
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the project file and rebuild the engine from it.
    pub fn load(&self, config: EngineConfig) -> Result<Engine> {
        if !self.exists() {
            bail!(
                "no project file at {} (run `flowline init` first)",
                self.path.display()
            );
        }
        debug!(path = %self.path.display(), "Loading project");
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let file: ProjectFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        let engine = Engine::restore(config, file.snapshot)
            .with_context(|| format!("failed to restore {}", self.path.display()))?;
        engine.resume_ticks(file.ticks_taken);
        Ok(engine)
    }

    /// Persist the engine's current snapshot and tick counter.
    pub fn save(&self, engine: &Engine) -> Result<()> {
        let file = ProjectFile {
            snapshot: engine.snapshot(),
            ticks_taken: engine.ticks_taken(),
        };
        let content =
            serde_json::to_string_pretty(&file).context("failed to serialize project")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Saved project");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::TaskSpec;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("flowline.json"));
        assert!(!store.exists());

        let engine = Engine::new(EngineConfig::default()).unwrap();
        let id = engine
            .create_task(TaskSpec::forward("mill chassis plate", 0.4))
            .unwrap();
        engine.tick();
        engine.tick();
        store.save(&engine).unwrap();

        let restored = store.load(EngineConfig::default()).unwrap();
        assert!(restored.task(id).is_ok());
        assert_eq!(restored.ticks_taken(), 2);
    }

    #[test]
    fn test_load_missing_file_points_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("absent.json"));
        let err = store.load(EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("flowline init"));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowline.json");
        std::fs::write(&path, "not json").unwrap();
        let store = ProjectStore::new(path);
        assert!(store.load(EngineConfig::default()).is_err());
    }
}
