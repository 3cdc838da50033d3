//! Exported run results and cross-replication merge
//!
//! Replications are independent `Simulation` instances (typically one per
//! thread). Each turns into a `SimulationReport` once its run is over; the
//! reports are then merged into one set of records tagged with their
//! replication index.

use crate::monitor::{ArrivalRecord, AttributeRecord, ResourceSample, ResourceUsageRecord};
use crate::orchestrator::engine::{Simulation, SimulationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything one instance recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique per report
    pub run_id: Uuid,
    pub replication: usize,
    /// Hash of the static config the instance was built from
    pub config_hash: String,
    pub final_time: f64,
    /// Digest of the dispatched event sequence
    pub trace_digest: String,
    pub arrivals: Vec<ArrivalRecord>,
    pub resource_usage: Vec<ResourceUsageRecord>,
    pub resource_samples: Vec<ResourceSample>,
    pub attributes: Vec<AttributeRecord>,
    /// Arrivals spawned per generator
    pub generated: BTreeMap<String, u64>,
}

/// A record tagged with the replication it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replicated<T> {
    pub replication: usize,
    #[serde(flatten)]
    pub record: T,
}

/// Records of several replications, ordered by replication then by their
/// original order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedReport {
    pub config_hash: String,
    pub replications: usize,
    pub arrivals: Vec<Replicated<ArrivalRecord>>,
    pub resource_usage: Vec<Replicated<ResourceUsageRecord>>,
    pub resource_samples: Vec<Replicated<ResourceSample>>,
    pub attributes: Vec<Replicated<AttributeRecord>>,
}

impl Simulation {
    /// Consume the instance into its exported report
    pub fn into_report(mut self, replication: usize) -> Result<SimulationReport, SimulationError> {
        self.monitor.flush();
        let config_hash = self.config.config_hash()?;
        let final_time = self.now();
        let trace_digest = self.trace_digest();
        let generated = self
            .generators
            .iter()
            .map(|g| (g.name().to_string(), g.generated()))
            .collect();

        let records = self.monitor.into_memory();
        Ok(SimulationReport {
            run_id: Uuid::new_v4(),
            replication,
            config_hash,
            final_time,
            trace_digest,
            arrivals: records.arrivals().to_vec(),
            resource_usage: records.resource_usage().to_vec(),
            resource_samples: records.resource_samples().to_vec(),
            attributes: records.attributes().to_vec(),
            generated,
        })
    }
}

fn tag<T: Clone>(replication: usize, records: &[T]) -> impl Iterator<Item = Replicated<T>> + '_ {
    records.iter().cloned().map(move |record| Replicated {
        replication,
        record,
    })
}

/// Merge reports of replications of one setup
///
/// # Errors
/// `SimulationError::InvalidConfig` if the reports were built from
/// different configs
pub fn merge_reports(mut reports: Vec<SimulationReport>) -> Result<MergedReport, SimulationError> {
    reports.sort_by_key(|r| r.replication);

    let config_hash = reports
        .first()
        .map(|r| r.config_hash.clone())
        .unwrap_or_default();
    if let Some(other) = reports.iter().find(|r| r.config_hash != config_hash) {
        return Err(SimulationError::InvalidConfig(format!(
            "Replication {} was built from a different config",
            other.replication
        )));
    }

    let mut merged = MergedReport {
        config_hash,
        replications: reports.len(),
        ..MergedReport::default()
    };
    for report in &reports {
        merged.arrivals.extend(tag(report.replication, &report.arrivals));
        merged
            .resource_usage
            .extend(tag(report.replication, &report.resource_usage));
        merged
            .resource_samples
            .extend(tag(report.replication, &report.resource_samples));
        merged
            .attributes
            .extend(tag(report.replication, &report.attributes));
    }
    Ok(merged)
}
