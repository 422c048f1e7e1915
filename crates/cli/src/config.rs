use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use flowline_core::EngineConfig;

/// Return the default config directory path: ~/.config/flowline/
pub fn default_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("could not determine user config directory")?
        .join("flowline");
    Ok(config_dir)
}

/// Return the default config file path.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("config.toml"))
}

/// Load the engine configuration from the given path, or the default path.
/// A missing file gets created with defaults so it can be edited later.
pub fn load(path: Option<&str>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path()?,
    };

    if config_path.exists() {
        debug!(?config_path, "Loading config");
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;
        let config = EngineConfig::from_toml_str(&content)
            .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
        Ok(config)
    } else {
        debug!(?config_path, "Config file not found, using defaults");
        let config = EngineConfig::default();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let toml_str =
            toml::to_string_pretty(&config).context("failed to serialize default config")?;
        std::fs::write(&config_path, toml_str).ok();
        Ok(config)
    }
}
