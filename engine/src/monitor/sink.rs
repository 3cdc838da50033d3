//! Monitor sinks
//!
//! A sink receives every record the simulation produces. Errors returned by
//! a sink are reported back to the monitor, which logs and counts them.

use crate::monitor::records::{
    ArrivalRecord, AttributeRecord, ResourceSample, ResourceUsageRecord,
};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

/// Sink failures
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for monitoring records
pub trait MonitorSink: Send {
    fn record_arrival(&mut self, record: &ArrivalRecord) -> Result<(), MonitorError>;

    fn record_resource_sample(&mut self, sample: &ResourceSample) -> Result<(), MonitorError>;

    fn record_resource_usage(&mut self, _record: &ResourceUsageRecord) -> Result<(), MonitorError> {
        Ok(())
    }

    fn record_attribute(&mut self, _record: &AttributeRecord) -> Result<(), MonitorError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line<'a> {
    Arrival(&'a ArrivalRecord),
    ResourceSample(&'a ResourceSample),
    ResourceUsage(&'a ResourceUsageRecord),
    Attribute(&'a AttributeRecord),
}

/// Writes one JSON object per record, one record per line
///
/// # Example
/// ```
/// use queue_simulator_core_rs::monitor::{JsonLinesSink, MonitorSink, ResourceSample};
///
/// let mut sink = JsonLinesSink::new(Vec::new());
/// sink.record_resource_sample(&ResourceSample {
///     resource: "server".to_string(),
///     time: 1.5,
///     server_count: 1,
///     queue_count: 0,
///     capacity: 1,
///     queue_capacity: None,
/// }).unwrap();
///
/// let text = String::from_utf8(sink.into_inner()).unwrap();
/// assert!(text.starts_with(r#"{"type":"resource_sample","resource":"server""#));
/// ```
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    lines: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &Line<'_>) -> Result<(), MonitorError> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write + Send> MonitorSink for JsonLinesSink<W> {
    fn record_arrival(&mut self, record: &ArrivalRecord) -> Result<(), MonitorError> {
        self.write_line(&Line::Arrival(record))
    }

    fn record_resource_sample(&mut self, sample: &ResourceSample) -> Result<(), MonitorError> {
        self.write_line(&Line::ResourceSample(sample))
    }

    fn record_resource_usage(&mut self, record: &ResourceUsageRecord) -> Result<(), MonitorError> {
        self.write_line(&Line::ResourceUsage(record))
    }

    fn record_attribute(&mut self, record: &AttributeRecord) -> Result<(), MonitorError> {
        self.write_line(&Line::Attribute(record))
    }

    fn flush(&mut self) -> Result<(), MonitorError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArrivalOutcome;
    use std::collections::BTreeMap;

    #[test]
    fn test_arrival_line_is_tagged_json() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record_arrival(&ArrivalRecord {
            name: "c3".to_string(),
            generator: "c".to_string(),
            start_time: 0.0,
            end_time: 2.0,
            activity_time: 2.0,
            waiting_time: 0.0,
            finished: false,
            outcome: ArrivalOutcome::Rejected {
                resource: "desk".to_string(),
            },
            per_resource_wait: BTreeMap::new(),
        })
        .unwrap();
        assert_eq!(sink.lines(), 1);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["type"], "arrival");
        assert_eq!(value["name"], "c3");
        assert_eq!(value["outcome"]["kind"], "rejected");
        assert_eq!(value["outcome"]["resource"], "desk");
    }
}
