//! Simulation setup loaded from JSON
//!
//! Only the static part of a model lives here: the seed and the resources.
//! Trajectories and generators carry closures and are built in code.

use crate::monitor::MonitorLevel;
use crate::orchestrator::engine::SimulationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// One service station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    /// Server units
    pub capacity: u32,

    /// Waiting room; absent means unbounded
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    #[serde(default)]
    pub monitor: MonitorLevel,
}

/// Static simulation setup
///
/// # Example
/// ```
/// use queue_simulator_core_rs::orchestrator::SimulationConfig;
///
/// let config = SimulationConfig::from_json(r#"{
///     "rng_seed": 42,
///     "resources": [
///         {"name": "server", "capacity": 2, "queue_capacity": 1}
///     ]
/// }"#).unwrap();
///
/// assert_eq!(config.resources[0].queue_capacity, Some(1));
/// assert_eq!(config.config_hash().unwrap().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed of the instance's random stream
    pub rng_seed: u64,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl SimulationConfig {
    /// Config with no resources
    pub fn new(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            resources: Vec::new(),
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        let config: SimulationConfig = serde_json::from_str(json)
            .map_err(|e| SimulationError::InvalidConfig(format!("Malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check resource names are non-empty and unique
    pub fn validate(&self) -> Result<(), SimulationError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err(SimulationError::InvalidConfig(
                    "Resource name must not be empty".to_string(),
                ));
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(SimulationError::DuplicateResource(resource.name.clone()));
            }
        }
        Ok(())
    }

    /// Hex SHA-256 of the serialized setup, seed excluded
    ///
    /// Replications of one setup differ only by seed and share this hash.
    pub fn config_hash(&self) -> Result<String, SimulationError> {
        let json = serde_json::to_string(&self.resources).map_err(|e| {
            SimulationError::Serialization(format!("Config serialization failed: {}", e))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64, capacity: u32) -> SimulationConfig {
        SimulationConfig {
            rng_seed: seed,
            resources: vec![ResourceConfig {
                name: "desk".to_string(),
                capacity,
                queue_capacity: None,
                monitor: MonitorLevel::Basic,
            }],
        }
    }

    #[test]
    fn test_config_hash_deterministic() {
        assert_eq!(
            config(1, 1).config_hash().unwrap(),
            config(1, 1).config_hash().unwrap(),
            "Same config should produce same hash"
        );
        assert_ne!(
            config(1, 1).config_hash().unwrap(),
            config(1, 2).config_hash().unwrap(),
            "Different resources should produce different hashes"
        );
    }

    #[test]
    fn test_config_hash_ignores_seed() {
        assert_eq!(
            config(1, 1).config_hash().unwrap(),
            config(2, 1).config_hash().unwrap()
        );
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut c = config(1, 1);
        c.resources.push(c.resources[0].clone());
        assert!(matches!(
            c.validate(),
            Err(SimulationError::DuplicateResource(name)) if name == "desk"
        ));
    }

    #[test]
    fn test_malformed_json_is_invalid_config() {
        let result = SimulationConfig::from_json(r#"{"resources": []}"#);
        assert!(matches!(result, Err(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let c = SimulationConfig::from_json(
            r#"{"rng_seed": 5, "resources": [{"name": "r", "capacity": 3}]}"#,
        )
        .unwrap();
        assert_eq!(c.resources[0].queue_capacity, None);
        assert_eq!(c.resources[0].monitor, MonitorLevel::Basic);
    }
}
