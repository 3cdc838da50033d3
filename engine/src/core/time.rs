//! Time management for the simulation
//!
//! The simulation operates in continuous time. The clock only ever moves
//! forward: every dispatched event carries a due time that is greater than
//! or equal to the current reading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when the clock would be moved to an invalid instant
#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("Clock cannot move backward: now {now}, requested {requested}")]
    Backward { now: f64, requested: f64 },

    #[error("Clock cannot move to non-finite time {0}")]
    NonFinite(f64),
}

/// Simulated-time cursor for one simulation instance
///
/// # Example
/// ```
/// use queue_simulator_core_rs::Clock;
///
/// let mut clock = Clock::new();
/// assert_eq!(clock.now(), 0.0);
///
/// clock.advance_to(2.5).unwrap();
/// assert_eq!(clock.now(), 2.5);
/// assert!(clock.advance_to(1.0).is_err());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clock {
    /// Current simulated time
    now: f64,
}

impl Clock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Move the clock to `time`
    ///
    /// Moving to the current instant is legal (instantaneous chaining).
    ///
    /// # Errors
    /// * `ClockError::Backward` if `time < now`
    /// * `ClockError::NonFinite` if `time` is NaN or infinite
    pub fn advance_to(&mut self, time: f64) -> Result<(), ClockError> {
        if !time.is_finite() {
            return Err(ClockError::NonFinite(time));
        }
        if time < self.now {
            return Err(ClockError::Backward {
                now: self.now,
                requested: time,
            });
        }
        self.now = time;
        Ok(())
    }
}
