use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine configuration, typically parsed from TOML.
///
/// Every threshold applies to the clamped 0.0–1.0 risk scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk inventory budget. Forward admission is blocked while the summed
    /// contributions of unvalidated forward tasks reach this value.
    #[serde(default = "default_max_inventory")]
    pub max_inventory: f64,

    /// Propagated-risk score above which a forward candidate is held back
    /// entirely.
    #[serde(default = "default_hold_threshold")]
    pub hold_threshold: f64,

    /// Propagated-risk score at or above which a forward candidate is only
    /// tentatively admitted (ranked after every normal start).
    #[serde(default = "default_tentative_threshold")]
    pub tentative_threshold: f64,

    /// Volatility at or above which a plan change is treated as a scrap
    /// event and a downstream reset advisory is raised.
    #[serde(default = "default_scrap_threshold")]
    pub scrap_threshold: f64,

    /// Zero-risk fallback work recommended when nothing else is actionable.
    /// Lives outside the risk model entirely.
    #[serde(default)]
    pub infrastructure_backlog: Vec<String>,
}

fn default_max_inventory() -> f64 {
    2.5
}

fn default_hold_threshold() -> f64 {
    0.8
}

fn default_tentative_threshold() -> f64 {
    0.5
}

fn default_scrap_threshold() -> f64 {
    0.8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_inventory: default_max_inventory(),
            hold_threshold: default_hold_threshold(),
            tentative_threshold: default_tentative_threshold(),
            scrap_threshold: default_scrap_threshold(),
            infrastructure_backlog: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML document. File reading is the host's job.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_inventory.is_finite() || self.max_inventory <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_inventory {} must be positive",
                self.max_inventory
            )));
        }
        for (name, value) in [
            ("hold_threshold", self.hold_threshold),
            ("tentative_threshold", self.tentative_threshold),
            ("scrap_threshold", self.scrap_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} {} outside [0.0, 1.0]",
                    name, value
                )));
            }
        }
        if self.tentative_threshold > self.hold_threshold {
            return Err(Error::InvalidConfig(format!(
                "tentative_threshold {} above hold_threshold {}",
                self.tentative_threshold, self.hold_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_inventory, 2.5);
        assert_eq!(config.hold_threshold, 0.8);
        assert_eq!(config.tentative_threshold, 0.5);
        assert_eq!(config.scrap_threshold, 0.8);
        assert!(config.infrastructure_backlog.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str("max_inventory = 1.0\n").unwrap();
        assert_eq!(config.max_inventory, 1.0);
        assert_eq!(config.hold_threshold, 0.8);
    }

    #[test]
    fn toml_backlog_list() {
        let raw = r#"
            max_inventory = 2.0
            infrastructure_backlog = ["write test harness", "update wiring docs"]
        "#;
        let config = EngineConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.infrastructure_backlog.len(), 2);
    }

    #[test]
    fn validate_rejects_bad_budget() {
        let mut config = EngineConfig::default();
        config.max_inventory = 0.0;
        assert!(config.validate().is_err());
        config.max_inventory = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = EngineConfig::default();
        config.tentative_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_toml_is_invalid_config() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_inventory = \"lots\""),
            Err(Error::InvalidConfig(_))
        ));
    }
}
