//! Event scheduling
//!
//! Provides the priority-ordered event queue that drives a simulation.
//!
//! # Components
//!
//! - **types**: `Event` and its payload `EventKind`
//! - **scheduler**: `EventScheduler`, the queue plus the clock
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::events::{EventKind, EventScheduler};
//! use queue_simulator_core_rs::models::GeneratorId;
//!
//! let mut scheduler = EventScheduler::new();
//! scheduler.schedule(1.0, EventKind::Spawn { generator: GeneratorId(0) }).unwrap();
//!
//! let event = scheduler.pop_until(10.0).unwrap().unwrap();
//! assert_eq!(event.time, 1.0);
//! assert_eq!(scheduler.now(), 1.0);
//! ```

pub mod scheduler;
pub mod types;

pub use scheduler::{EventScheduler, SchedulerError};
pub use types::{Event, EventKind};
