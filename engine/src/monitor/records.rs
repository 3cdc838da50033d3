//! Monitoring records and their in-memory log
//!
//! Records are immutable snapshots. The `MemoryMonitor` keeps them in the
//! order they were produced and offers the query helpers reporting code
//! needs (by generator, by resource, by outcome).

use crate::models::ArrivalOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of one arrival
///
/// For a normally finished arrival
/// `activity_time + waiting_time == end_time - start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub name: String,
    pub generator: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Time spent in timeouts
    pub activity_time: f64,
    /// Time spent in resource queues and synchronize barriers
    pub waiting_time: f64,
    pub finished: bool,
    pub outcome: ArrivalOutcome,
    /// Queue wait per resource name
    pub per_resource_wait: BTreeMap<String, f64>,
}

/// The record produced for every completed arrival
pub type MonitorRecord = ArrivalRecord;

impl ArrivalRecord {
    /// Time in system
    pub fn flow_time(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One arrival's stay at one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsageRecord {
    pub name: String,
    pub resource: String,
    /// When the units were requested
    pub start_time: f64,
    /// When the last held unit was released
    pub end_time: f64,
    /// Time holding the units
    pub activity_time: f64,
}

impl ResourceUsageRecord {
    /// Time spent queueing for the units
    pub fn waiting_time(&self) -> f64 {
        self.end_time - self.start_time - self.activity_time
    }
}

/// Resource state right after a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub resource: String,
    pub time: f64,
    pub server_count: u32,
    pub queue_count: usize,
    pub capacity: u32,
    /// `None` for an unbounded queue
    pub queue_capacity: Option<usize>,
}

impl ResourceSample {
    /// Units in service plus waiting requests
    pub fn system_count(&self) -> f64 {
        self.server_count as f64 + self.queue_count as f64
    }
}

/// Attribute write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub time: f64,
    /// `None` for a global attribute
    pub arrival: Option<String>,
    pub key: String,
    pub value: f64,
}

/// In-memory record log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMonitor {
    arrivals: Vec<ArrivalRecord>,
    resource_usage: Vec<ResourceUsageRecord>,
    resource_samples: Vec<ResourceSample>,
    attributes: Vec<AttributeRecord>,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_arrival(&mut self, record: ArrivalRecord) {
        self.arrivals.push(record);
    }

    pub(crate) fn push_resource_usage(&mut self, record: ResourceUsageRecord) {
        self.resource_usage.push(record);
    }

    pub(crate) fn push_resource_sample(&mut self, sample: ResourceSample) {
        self.resource_samples.push(sample);
    }

    pub(crate) fn push_attribute(&mut self, record: AttributeRecord) {
        self.attributes.push(record);
    }

    /// Completed arrivals, in completion order
    pub fn arrivals(&self) -> &[ArrivalRecord] {
        &self.arrivals
    }

    /// Per-resource stays, in release order
    pub fn resource_usage(&self) -> &[ResourceUsageRecord] {
        &self.resource_usage
    }

    /// Resource samples, in time order
    pub fn resource_samples(&self) -> &[ResourceSample] {
        &self.resource_samples
    }

    pub fn attributes(&self) -> &[AttributeRecord] {
        &self.attributes
    }

    /// Arrivals spawned by one generator
    pub fn arrivals_for_generator(&self, generator: &str) -> Vec<&ArrivalRecord> {
        self.arrivals
            .iter()
            .filter(|r| r.generator == generator)
            .collect()
    }

    /// Arrivals whose outcome has the given label (`finished`, `left`, ...)
    pub fn arrivals_with_outcome(&self, label: &str) -> Vec<&ArrivalRecord> {
        self.arrivals
            .iter()
            .filter(|r| r.outcome.label() == label)
            .collect()
    }

    /// Samples of one resource
    pub fn samples_for_resource(&self, resource: &str) -> Vec<&ResourceSample> {
        self.resource_samples
            .iter()
            .filter(|s| s.resource == resource)
            .collect()
    }

    /// Samples grouped by resource name
    pub fn samples_by_resource(&self) -> BTreeMap<&str, Vec<&ResourceSample>> {
        let mut grouped: BTreeMap<&str, Vec<&ResourceSample>> = BTreeMap::new();
        for sample in &self.resource_samples {
            grouped.entry(sample.resource.as_str()).or_default().push(sample);
        }
        grouped
    }

    /// Stays at one resource
    pub fn usage_for_resource(&self, resource: &str) -> Vec<&ResourceUsageRecord> {
        self.resource_usage
            .iter()
            .filter(|r| r.resource == resource)
            .collect()
    }

    pub fn clear(&mut self) {
        self.arrivals.clear();
        self.resource_usage.clear();
        self.resource_samples.clear();
        self.attributes.clear();
    }
}
