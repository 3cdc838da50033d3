//! Queue Simulator Core - Rust Engine
//!
//! Discrete-event simulation engine for queueing networks: arrivals walk
//! shared activity graphs (trajectories), compete for resources with finite
//! servers and waiting rooms, and leave monitoring records behind.
//!
//! # Architecture
//!
//! - **core**: The simulated clock
//! - **events**: Priority-ordered event queue driving the clock
//! - **models**: Domain types (Resource, Trajectory, Arrival, Attributes)
//! - **arrivals**: Generators spawning arrivals
//! - **monitor**: Arrival, usage and resource records plus sinks
//! - **orchestrator**: Simulation instance, execution loop, config, reports
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Events run in nondecreasing time order, FIFO within an instant
//! 2. The clock never moves backward; an attempt halts the run
//! 3. `0 <= in_service <= capacity` and `0 <= queued <= queue_capacity`
//! 4. All randomness is deterministic (seeded RNG per instance)
//!
//! # Example
//!
//! ```
//! use queue_simulator_core_rs::{Distribution, Generator, Simulation, TrajectoryBuilder};
//! use std::sync::Arc;
//!
//! let service = Distribution::Exponential { rate: 4.0 };
//! let customer = Arc::new(
//!     TrajectoryBuilder::new("customer")
//!         .seize("server", 1)
//!         .timeout_with(move |ctx| service.sample(ctx.rng()))
//!         .release("server", 1)
//!         .build(),
//! );
//!
//! let mut sim = Simulation::new(2024);
//! sim.add_resource("server", 1, None).unwrap();
//! sim.add_generator(Generator::new(
//!     "customer",
//!     customer,
//!     Distribution::Exponential { rate: 2.0 }.into_fn(),
//! ))
//! .unwrap();
//! sim.run_until(100.0).unwrap();
//!
//! assert_eq!(sim.now(), 100.0);
//! assert!(sim.generated_count("customer").unwrap() > 0);
//! ```

// Module declarations
pub mod arrivals;
pub mod core;
pub mod events;
pub mod models;
pub mod monitor;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use arrivals::{Distribution, Generator};
pub use crate::core::time::Clock;
pub use events::{Event, EventKind, EventScheduler, SchedulerError};
pub use models::{
    constant, Activity, ArrivalError, ArrivalOutcome, AttributeMod, AttributeScope, Attributes,
    Context, QueueCapacity, Resource, SeizeOutcome, Trajectory, TrajectoryBuilder,
};
pub use monitor::{
    ArrivalRecord, JsonLinesSink, MemoryMonitor, MonitorError, MonitorLevel, MonitorRecord,
    MonitorSink, ResourceSample,
};
pub use orchestrator::{
    merge_reports, Simulation, SimulationConfig, SimulationError, SimulationReport,
};
pub use rng::RngManager;
