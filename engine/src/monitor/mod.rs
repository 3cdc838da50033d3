//! Monitoring: append-only records of what happened during a run
//!
//! Every record goes to the in-memory `MemoryMonitor` that backs the query
//! API, then to any extra `MonitorSink`s. Sinks are best-effort: a failing
//! sink is logged and counted, it never affects the simulation.
//!
//! # Components
//!
//! - **records**: record types and the `MemoryMonitor` query helpers
//! - **sink**: the `MonitorSink` trait and `JsonLinesSink`

pub mod records;
pub mod sink;

pub use records::{
    ArrivalRecord, AttributeRecord, MemoryMonitor, MonitorRecord, ResourceSample,
    ResourceUsageRecord,
};
pub use sink::{JsonLinesSink, MonitorError, MonitorSink};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Monitoring granularity for a generator or a resource
///
/// For generators: `Basic` records arrivals, `Full` adds per-resource usage
/// and attribute changes. For resources anything but `Off` records a sample
/// on every change of the server or queue count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorLevel {
    Off,
    #[default]
    Basic,
    Full,
}

impl MonitorLevel {
    pub fn is_on(&self) -> bool {
        *self != MonitorLevel::Off
    }

    pub fn is_full(&self) -> bool {
        *self == MonitorLevel::Full
    }
}

/// Fan-out of records to memory and extra sinks
#[derive(Default)]
pub struct Monitor {
    memory: MemoryMonitor,
    sinks: Vec<Box<dyn MonitorSink>>,
    failures: u64,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn MonitorSink>) {
        self.sinks.push(sink);
    }

    pub fn memory(&self) -> &MemoryMonitor {
        &self.memory
    }

    pub fn into_memory(self) -> MemoryMonitor {
        self.memory
    }

    /// Records dropped by failing sinks
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn arrival(&mut self, record: ArrivalRecord) {
        self.fan_out("arrival", |sink| sink.record_arrival(&record));
        self.memory.push_arrival(record);
    }

    pub fn resource_usage(&mut self, record: ResourceUsageRecord) {
        self.fan_out("resource_usage", |sink| sink.record_resource_usage(&record));
        self.memory.push_resource_usage(record);
    }

    pub fn resource_sample(&mut self, sample: ResourceSample) {
        self.fan_out("resource_sample", |sink| sink.record_resource_sample(&sample));
        self.memory.push_resource_sample(sample);
    }

    pub fn attribute(&mut self, record: AttributeRecord) {
        self.fan_out("attribute", |sink| sink.record_attribute(&record));
        self.memory.push_attribute(record);
    }

    /// Flush every sink, logging failures
    pub fn flush(&mut self) {
        self.fan_out("flush", |sink| sink.flush());
    }

    fn fan_out<F>(&mut self, what: &str, mut write: F)
    where
        F: FnMut(&mut dyn MonitorSink) -> Result<(), MonitorError>,
    {
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(error) = write(sink.as_mut()) {
                self.failures += 1;
                warn!(sink = index, record = what, %error, "Monitor sink failed, record dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArrivalOutcome;

    struct Broken;

    impl MonitorSink for Broken {
        fn record_arrival(&mut self, _: &ArrivalRecord) -> Result<(), MonitorError> {
            Err(MonitorError::Rejected("disk full".to_string()))
        }

        fn record_resource_sample(&mut self, _: &ResourceSample) -> Result<(), MonitorError> {
            Ok(())
        }
    }

    fn record() -> ArrivalRecord {
        ArrivalRecord {
            name: "a0".to_string(),
            generator: "a".to_string(),
            start_time: 0.0,
            end_time: 1.0,
            activity_time: 1.0,
            waiting_time: 0.0,
            finished: true,
            outcome: ArrivalOutcome::Finished,
            per_resource_wait: Default::default(),
        }
    }

    #[test]
    fn test_failing_sink_does_not_lose_memory_record() {
        let mut monitor = Monitor::new();
        monitor.add_sink(Box::new(Broken));

        monitor.arrival(record());
        monitor.arrival(record());

        assert_eq!(monitor.failures(), 2);
        assert_eq!(monitor.memory().arrivals().len(), 2);
    }

    #[test]
    fn test_levels() {
        assert!(!MonitorLevel::Off.is_on());
        assert!(MonitorLevel::Basic.is_on());
        assert!(!MonitorLevel::Basic.is_full());
        assert!(MonitorLevel::Full.is_full());
        assert_eq!(MonitorLevel::default(), MonitorLevel::Basic);
    }
}
