//! Arrival sources
//!
//! A `Generator` spawns arrivals into one trajectory at instants drawn from
//! an interarrival callable. The simulation owns generators and asks them
//! for the next spawn time each time one fires.
//!
//! # Stopping rules
//!
//! A generator stops for good when:
//! - its arrival limit is reached (`with_limit`)
//! - the next spawn would be at or after its stop time (`stop_at`)
//! - the interarrival callable returns a negative, NaN or infinite value
//!
//! # Example
//!
//! ```
//! use queue_simulator_core_rs::arrivals::{Distribution, Generator};
//! use queue_simulator_core_rs::models::TrajectoryBuilder;
//! use std::sync::Arc;
//!
//! let customer = Arc::new(TrajectoryBuilder::new("customer").timeout(1.0).build());
//! let generator = Generator::new(
//!     "customer",
//!     customer,
//!     Distribution::Exponential { rate: 2.0 }.into_fn(),
//! )
//! .with_limit(100);
//!
//! assert_eq!(generator.limit(), Some(100));
//! assert_eq!(generator.generated(), 0);
//! ```

pub mod distribution;

pub use distribution::Distribution;

use crate::models::attributes::Attributes;
use crate::models::trajectory::{Context, Trajectory, ValueFn};
use crate::monitor::MonitorLevel;
use crate::rng::RngManager;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of arrivals for one trajectory
#[derive(Clone)]
pub struct Generator {
    name: String,
    trajectory: Arc<Trajectory>,
    interarrival: ValueFn,
    monitor: MonitorLevel,
    limit: Option<u64>,
    stop_at: Option<f64>,

    /// Arrivals spawned so far
    generated: u64,
    /// Set once a stopping rule fired
    stopped: bool,
}

impl Generator {
    /// Create a generator with basic monitoring, no limit and no stop time
    pub fn new(name: impl Into<String>, trajectory: Arc<Trajectory>, interarrival: ValueFn) -> Self {
        Self {
            name: name.into(),
            trajectory,
            interarrival,
            monitor: MonitorLevel::Basic,
            limit: None,
            stop_at: None,
            generated: 0,
            stopped: false,
        }
    }

    /// Stop after `limit` arrivals
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Never spawn at or after `time`
    pub fn stop_at(mut self, time: f64) -> Self {
        self.stop_at = Some(time);
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorLevel) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trajectory(&self) -> &Arc<Trajectory> {
        &self.trajectory
    }

    pub fn monitor(&self) -> MonitorLevel {
        self.monitor
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Whether the generator will spawn again
    pub fn is_active(&self) -> bool {
        !self.stopped && self.limit.map_or(true, |limit| self.generated < limit)
    }

    /// Count a spawn and return the new arrival's name
    pub(crate) fn spawn_name(&mut self) -> String {
        let name = format!("{}{}", self.name, self.generated);
        self.generated += 1;
        name
    }

    /// Draw the next spawn instant after `now`
    ///
    /// Returns `None` once any stopping rule fires; the generator stays
    /// stopped after that.
    pub(crate) fn next_spawn(
        &mut self,
        now: f64,
        globals: &Attributes,
        rng: &mut RngManager,
    ) -> Option<f64> {
        if !self.is_active() {
            return None;
        }

        let attributes = Attributes::new();
        let mut ctx = Context::new(now, &attributes, globals, rng);
        let delay = (self.interarrival)(&mut ctx);

        if delay.is_nan() {
            warn!(generator = %self.name, time = now, "Interarrival returned NaN, generator stopped");
            self.stopped = true;
            return None;
        }
        if delay < 0.0 || delay.is_infinite() {
            debug!(generator = %self.name, time = now, delay, "Generator stopped");
            self.stopped = true;
            return None;
        }

        let at = now + delay;
        if self.stop_at.is_some_and(|stop| at >= stop) {
            debug!(generator = %self.name, time = now, next = at, "Generator reached its stop time");
            self.stopped = true;
            return None;
        }
        Some(at)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name)
            .field("trajectory", &self.trajectory.name())
            .field("monitor", &self.monitor)
            .field("limit", &self.limit)
            .field("stop_at", &self.stop_at)
            .field("generated", &self.generated)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
