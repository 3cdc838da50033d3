//! Simulation instance: setup, run control and queries
//!
//! One `Simulation` owns everything a run touches: the scheduler and its
//! clock, the random stream, resources, generators, live arrivals and the
//! monitor. Instances share nothing, so replications can run on separate
//! threads and be merged afterwards (see `report`).
//!
//! # Lifecycle
//!
//! 1. **Setup**: `new`/`from_config`, then `add_resource`, `add_generator`
//!    and `add_sink`. Adding a generator schedules its first spawn.
//! 2. **Run**: `run_until(horizon)`, `run()` or `step()`, any number of
//!    times. A scheduler invariant breach halts the instance for good.
//! 3. **Query**: records and counters, or `into_report` for export.
//!
//! # Example
//!
//! ```
//! use queue_simulator_core_rs::arrivals::Generator;
//! use queue_simulator_core_rs::models::{constant, TrajectoryBuilder};
//! use queue_simulator_core_rs::orchestrator::Simulation;
//! use std::sync::Arc;
//!
//! let customer = Arc::new(
//!     TrajectoryBuilder::new("customer")
//!         .seize("desk", 1)
//!         .timeout(3.0)
//!         .release("desk", 1)
//!         .build(),
//! );
//!
//! let mut sim = Simulation::new(42);
//! sim.add_resource("desk", 1, None).unwrap();
//! sim.add_generator(Generator::new("customer", customer, constant(1.0)).with_limit(3))
//!     .unwrap();
//! sim.run().unwrap();
//!
//! let records = sim.arrival_records();
//! assert_eq!(records.len(), 3);
//! // Third customer arrives at 3 and waits for the first two services
//! assert_eq!(records[2].end_time, 10.0);
//! assert_eq!(records[2].waiting_time, 4.0);
//! ```

use crate::arrivals::Generator;
use crate::events::{EventScheduler, SchedulerError};
use crate::models::{
    Arrival, ArrivalId, Attributes, Cursor, CursorId, GeneratorId, QueueCapacity, Resource,
    ResourceError, ResourceId,
};
use crate::monitor::{
    ArrivalRecord, AttributeRecord, MemoryMonitor, Monitor, MonitorSink, ResourceSample,
    ResourceUsageRecord,
};
use crate::orchestrator::config::{ResourceConfig, SimulationConfig};
use crate::rng::RngManager;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{error, info};

/// Run-level errors
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Resource '{0}' already exists")]
    DuplicateResource(String),

    #[error("Generator '{0}' already exists")]
    DuplicateGenerator(String),

    #[error("Unknown generator '{0}'")]
    UnknownGenerator(String),

    /// A branch selector picked a continuation that does not exist
    #[error("Branch selected continuation {index} but only {len} exist")]
    BranchOutOfRange { index: usize, len: usize },

    #[error("Trajectory '{trajectory}' has no node {node}")]
    DanglingNode { trajectory: String, node: usize },

    #[error("Arrival {0} is not live")]
    UnknownArrival(ArrivalId),

    #[error("Resource bookkeeping error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid horizon {0}")]
    InvalidHorizon(f64),

    #[error("Simulation halted by an earlier error")]
    Halted,
}

/// One simulation instance
pub struct Simulation {
    pub(super) config: SimulationConfig,
    pub(super) scheduler: EventScheduler,
    pub(super) rng: RngManager,

    pub(super) resources: Vec<Resource>,
    pub(super) resource_index: HashMap<String, ResourceId>,
    pub(super) generators: Vec<Generator>,
    pub(super) generator_index: HashMap<String, GeneratorId>,

    /// Live arrivals; removed (and recorded) when their last cursor ends
    pub(super) arrivals: HashMap<ArrivalId, Arrival>,
    /// Suspended cursors
    pub(super) cursors: HashMap<CursorId, Cursor>,
    pub(super) globals: Attributes,
    pub(super) monitor: Monitor,

    pub(super) next_arrival: u64,
    pub(super) next_cursor: u64,
    pub(super) next_fork: u64,
    halted: bool,
}

impl Simulation {
    /// Empty instance with the given seed
    pub fn new(rng_seed: u64) -> Self {
        Self {
            config: SimulationConfig::new(rng_seed),
            scheduler: EventScheduler::new(),
            rng: RngManager::new(rng_seed),
            resources: Vec::new(),
            resource_index: HashMap::new(),
            generators: Vec::new(),
            generator_index: HashMap::new(),
            arrivals: HashMap::new(),
            cursors: HashMap::new(),
            globals: Attributes::new(),
            monitor: Monitor::new(),
            next_arrival: 0,
            next_cursor: 0,
            next_fork: 0,
            halted: false,
        }
    }

    /// Instance with the resources of a validated config
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut sim = Self::new(config.rng_seed);
        for resource in &config.resources {
            sim.add_resource_with(
                Resource::new(
                    resource.name.clone(),
                    resource.capacity,
                    QueueCapacity::from(resource.queue_capacity),
                )
                .with_monitor(resource.monitor),
            )?;
        }
        Ok(sim)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Add a resource; `queue_capacity` of `None` means unbounded
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        capacity: u32,
        queue_capacity: Option<usize>,
    ) -> Result<ResourceId, SimulationError> {
        self.add_resource_with(Resource::new(name, capacity, queue_capacity.into()))
    }

    /// Add a fully configured resource
    pub fn add_resource_with(&mut self, resource: Resource) -> Result<ResourceId, SimulationError> {
        let name = resource.name().to_string();
        if name.trim().is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Resource name must not be empty".to_string(),
            ));
        }
        if self.resource_index.contains_key(&name) {
            return Err(SimulationError::DuplicateResource(name));
        }

        let id = ResourceId(self.resources.len());
        self.config.resources.push(ResourceConfig {
            name: name.clone(),
            capacity: resource.capacity(),
            queue_capacity: resource.queue_capacity().limit(),
            monitor: resource.monitor(),
        });
        self.resource_index.insert(name, id);
        self.resources.push(resource);
        Ok(id)
    }

    /// Register a generator and schedule its first spawn
    pub fn add_generator(&mut self, generator: Generator) -> Result<GeneratorId, SimulationError> {
        self.ensure_live()?;
        let name = generator.name().to_string();
        if name.trim().is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Generator name must not be empty".to_string(),
            ));
        }
        if self.generator_index.contains_key(&name) {
            return Err(SimulationError::DuplicateGenerator(name));
        }

        let id = GeneratorId(self.generators.len());
        self.generator_index.insert(name, id);
        self.generators.push(generator);
        self.schedule_next_spawn(id)?;
        Ok(id)
    }

    /// Send every record to `sink` as well
    pub fn add_sink(&mut self, sink: Box<dyn MonitorSink>) {
        self.monitor.add_sink(sink);
    }

    /// Seed a global attribute
    pub fn set_global(&mut self, key: impl Into<String>, value: f64) {
        self.globals.set(key, value);
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Dispatch every event due at or before `horizon`
    ///
    /// With a finite horizon the clock ends at `horizon`; later events stay
    /// queued for the next call.
    ///
    /// # Errors
    /// Scheduler invariant breaches and configuration errors found while
    /// running (such as an out-of-range branch). The instance is halted
    /// afterwards and every later run call returns `SimulationError::Halted`.
    pub fn run_until(&mut self, horizon: f64) -> Result<(), SimulationError> {
        self.ensure_live()?;
        if horizon.is_nan() {
            return Err(SimulationError::InvalidHorizon(horizon));
        }

        info!(
            start = self.now(),
            horizon,
            pending = self.scheduler.len(),
            "Simulation run starting"
        );
        let before = self.scheduler.dispatched();

        let result = self.dispatch_until(horizon);
        self.monitor.flush();
        if let Err(e) = &result {
            self.halted = true;
            error!(time = self.now(), error = %e, "Simulation halted");
            return result;
        }

        info!(
            end = self.now(),
            events = self.scheduler.dispatched() - before,
            completed = self.monitor.memory().arrivals().len(),
            in_flight = self.arrivals.len(),
            "Simulation run finished"
        );
        Ok(())
    }

    /// Run until no events remain
    ///
    /// Never returns for a generator without a limit, stop time or
    /// terminating interarrival callable.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.run_until(f64::INFINITY)
    }

    /// Dispatch exactly one event; `false` if none was pending
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        self.ensure_live()?;
        let result = match self.scheduler.pop_until(f64::INFINITY) {
            Ok(Some(event)) => self.dispatch(event).map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e.into()),
        };
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    fn dispatch_until(&mut self, horizon: f64) -> Result<(), SimulationError> {
        while let Some(event) = self.scheduler.pop_until(horizon)? {
            self.dispatch(event)?;
        }
        self.scheduler.advance_idle(horizon)?;
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), SimulationError> {
        if self.halted {
            return Err(SimulationError::Halted);
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Due time of the next event
    pub fn peek(&self) -> Option<f64> {
        self.scheduler.peek_time()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Events dispatched so far
    pub fn events_dispatched(&self) -> u64 {
        self.scheduler.dispatched()
    }

    /// Hex digest of the dispatched event sequence
    pub fn trace_digest(&self) -> String {
        self.scheduler.trace_digest()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resource_index
            .get(name)
            .and_then(|id| self.resources.get(id.0))
    }

    pub fn generator(&self, name: &str) -> Option<&Generator> {
        self.generator_index
            .get(name)
            .and_then(|id| self.generators.get(id.0))
    }

    /// Arrivals spawned so far by `generator`
    pub fn generated_count(&self, generator: &str) -> Result<u64, SimulationError> {
        self.generator(generator)
            .map(Generator::generated)
            .ok_or_else(|| SimulationError::UnknownGenerator(generator.to_string()))
    }

    /// Arrivals spawned but not yet completed
    pub fn in_flight(&self) -> usize {
        self.arrivals.len()
    }

    pub fn globals(&self) -> &Attributes {
        &self.globals
    }

    /// Completed arrivals, in completion order
    pub fn arrival_records(&self) -> &[ArrivalRecord] {
        self.monitor.memory().arrivals()
    }

    pub fn resource_usage_records(&self) -> &[ResourceUsageRecord] {
        self.monitor.memory().resource_usage()
    }

    /// Every resource sample, in time order
    pub fn resource_samples(&self) -> &[ResourceSample] {
        self.monitor.memory().resource_samples()
    }

    /// Samples grouped per resource name
    pub fn resource_samples_by_resource(&self) -> BTreeMap<&str, Vec<&ResourceSample>> {
        self.monitor.memory().samples_by_resource()
    }

    pub fn attribute_records(&self) -> &[AttributeRecord] {
        self.monitor.memory().attributes()
    }

    /// The in-memory record log
    pub fn records(&self) -> &MemoryMonitor {
        self.monitor.memory()
    }

    /// Records dropped by failing sinks
    pub fn sink_failures(&self) -> u64 {
        self.monitor.failures()
    }
}
