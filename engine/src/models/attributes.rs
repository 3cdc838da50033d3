//! Per-arrival (and global) key/value state
//!
//! Values are `f64`, matching what duration and selector callables consume.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How `SetAttribute` combines a new value with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMod {
    /// Overwrite
    #[default]
    Replace,
    /// Stored value plus the new value (missing counts as 0)
    Add,
    /// Stored value times the new value (missing counts as 0)
    Multiply,
}

/// Where `SetAttribute` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeScope {
    /// The executing arrival's own store
    #[default]
    Arrival,
    /// The simulation-wide store shared by all arrivals
    Global,
}

/// Attribute store
///
/// # Example
/// ```
/// use queue_simulator_core_rs::models::{AttributeMod, Attributes};
///
/// let mut attrs = Attributes::new();
/// attrs.set("size", 3.0);
/// assert_eq!(attrs.apply("size", AttributeMod::Add, 2.0), 5.0);
/// assert_eq!(attrs.get("size"), Some(5.0));
/// assert_eq!(attrs.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    values: BTreeMap<String, f64>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Value for `key`, or `default` if unset
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Combine `value` into `key` according to `modifier`, returning the
    /// stored result
    pub fn apply(&mut self, key: &str, modifier: AttributeMod, value: f64) -> f64 {
        let current = self.get_or(key, 0.0);
        let updated = match modifier {
            AttributeMod::Replace => value,
            AttributeMod::Add => current + value,
            AttributeMod::Multiply => current * value,
        };
        self.values.insert(key.to_string(), updated);
        updated
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
