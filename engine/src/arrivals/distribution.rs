//! Convenience variates for interarrival and service times
//!
//! The engine never looks inside a duration callable. `Distribution` is
//! only a shortcut for the common cases, deserializable from config files.

use crate::models::trajectory::{Context, ValueFn};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Non-negative duration distributions
///
/// # Example
/// ```
/// use queue_simulator_core_rs::arrivals::Distribution;
/// use queue_simulator_core_rs::rng::RngManager;
///
/// let service: Distribution = serde_json::from_str(r#"{"type":"exponential","rate":4.0}"#).unwrap();
/// let mut rng = RngManager::new(7);
/// assert!(service.sample(&mut rng) >= 0.0);
/// assert_eq!(service.mean(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value
    Constant { value: f64 },

    /// Exponential with the given rate (mean `1 / rate`)
    Exponential { rate: f64 },

    /// Uniform in `[min, max)`
    Uniform { min: f64, max: f64 },

    /// Normal, negative draws truncated to zero
    Normal { mean: f64, std_dev: f64 },
}

impl Distribution {
    /// Draw one value
    ///
    /// A non-positive exponential rate yields `f64::INFINITY`, which stops a
    /// generator and fails a timeout.
    pub fn sample(&self, rng: &mut RngManager) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Exponential { rate } if rate > 0.0 => rng.exponential(rate),
            Distribution::Exponential { .. } => f64::INFINITY,
            Distribution::Uniform { min, max } => rng.uniform(min, max),
            Distribution::Normal { mean, std_dev } => {
                (mean + std_dev * rng.standard_normal()).max(0.0)
            }
        }
    }

    /// Untruncated mean
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Exponential { rate } => 1.0 / rate,
            Distribution::Uniform { min, max } => (min + max) / 2.0,
            Distribution::Normal { mean, .. } => mean,
        }
    }

    /// Turn into a duration callable drawing from the instance's stream
    pub fn into_fn(self) -> ValueFn {
        Arc::new(move |ctx: &mut Context<'_>| self.sample(ctx.rng()))
    }
}
