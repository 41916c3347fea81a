//! Simulation settings passed explicitly to constructors.
//!
//! ```yaml
//! safe_zone_ratio: 0.1
//! inverse_map:
//!   iterations: 10
//!   damping: 0.5
//! esf:
//!   boundary_region: 50.0
//!   search_region: 30.0
//! routine:
//!   high_sample_count: 10000
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distortion::InverseMapConfig;
use crate::esf::EsfConfig;
use crate::routine::RoutineConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fraction of each image dimension rendered as extra margin for distortion.
    pub safe_zone_ratio: f64,
    pub inverse_map: InverseMapConfig,
    pub esf: EsfConfig,
    pub routine: RoutineConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            safe_zone_ratio: 0.1,
            inverse_map: InverseMapConfig::default(),
            esf: EsfConfig::default(),
            routine: RoutineConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: SimConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.safe_zone_ratio.is_finite() || self.safe_zone_ratio < 0.0 {
            return Err(ConfigError::InvalidParams(format!(
                "safe_zone_ratio must be non-negative, got {}",
                self.safe_zone_ratio
            )));
        }
        if !(self.inverse_map.damping > 0.0 && self.inverse_map.damping <= 1.0) {
            return Err(ConfigError::InvalidParams(format!(
                "inverse_map.damping must be in (0, 1], got {}",
                self.inverse_map.damping
            )));
        }
        if !(self.esf.bin_width > 0.0) {
            return Err(ConfigError::InvalidParams(format!(
                "esf.bin_width must be positive, got {}",
                self.esf.bin_width
            )));
        }
        if self.routine.low_sample_count == 0 || self.routine.high_sample_count == 0 {
            return Err(ConfigError::InvalidParams(
                "routine sample counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SimConfig =
            serde_yaml::from_str("safe_zone_ratio: 0.2\ninverse_map:\n  iterations: 4\n").unwrap();
        assert_eq!(config.safe_zone_ratio, 0.2);
        assert_eq!(config.inverse_map.iterations, 4);
        assert_eq!(config.inverse_map.damping, 0.5);
        assert_eq!(config.esf, EsfConfig::default());
        assert_eq!(config.routine, RoutineConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        assert!(config.validate().is_ok());
        config.inverse_map.damping = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParams(_))
        ));
        config = SimConfig {
            safe_zone_ratio: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SimConfig::load_from_yaml("samples/does_not_exist.yaml"),
            Err(ConfigError::IOError(_))
        ));
    }
}
