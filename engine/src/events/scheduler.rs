//! The event queue and the clock it drives
//!
//! The scheduler owns every pending event. Handlers schedule follow-up events
//! while one is being dispatched; anything due before the current time is a
//! causality violation and aborts the run.

use crate::core::time::{Clock, ClockError};
use crate::events::types::{Event, EventKind};
use sha2::{Digest, Sha256};
use std::collections::BinaryHeap;
use thiserror::Error;
use tracing::trace;

/// Scheduler invariant breaches. Always fatal to the simulation instance.
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("Event scheduled in the past: due {due}, now {now}")]
    CausalityViolation { due: f64, now: f64 },

    #[error("Event scheduled at non-finite time {0}")]
    NonFiniteTime(f64),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Priority-ordered event queue plus the simulated clock
pub struct EventScheduler {
    clock: Clock,
    next_seq: u64,
    queue: BinaryHeap<Event>,
    dispatched: u64,
    /// Running hash over every dispatched event
    digest: Sha256,
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScheduler {
    /// Create an empty scheduler at time zero
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            next_seq: 0,
            queue: BinaryHeap::new(),
            dispatched: 0,
            digest: Sha256::new(),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Schedule `kind` at absolute time `at`
    ///
    /// Returns the sequence number assigned to the event.
    ///
    /// # Errors
    /// * `SchedulerError::NonFiniteTime` for NaN or infinite `at`
    /// * `SchedulerError::CausalityViolation` if `at < now`
    pub fn schedule(&mut self, at: f64, kind: EventKind) -> Result<u64, SchedulerError> {
        if !at.is_finite() {
            return Err(SchedulerError::NonFiniteTime(at));
        }
        if at < self.clock.now() {
            return Err(SchedulerError::CausalityViolation {
                due: at,
                now: self.clock.now(),
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Event { time: at, seq, kind });
        Ok(seq)
    }

    /// Schedule `kind` at `now + delay`
    pub fn schedule_in(&mut self, delay: f64, kind: EventKind) -> Result<u64, SchedulerError> {
        self.schedule(self.clock.now() + delay, kind)
    }

    /// Due time of the earliest pending event
    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|event| event.time)
    }

    /// Pop the earliest event if it is due at or before `horizon`
    ///
    /// Advances the clock to the event's due time and folds the event into
    /// the trace digest. Returns `Ok(None)` when the queue is empty or the
    /// next event lies beyond the horizon (the event stays queued).
    pub fn pop_until(&mut self, horizon: f64) -> Result<Option<Event>, SchedulerError> {
        match self.queue.peek() {
            Some(next) if next.time <= horizon => {}
            _ => return Ok(None),
        }
        let Some(event) = self.queue.pop() else {
            return Ok(None);
        };

        self.clock.advance_to(event.time)?;
        self.dispatched += 1;
        self.digest.update(event.time.to_bits().to_le_bytes());
        self.digest.update(event.seq.to_le_bytes());
        self.digest.update(event.kind.digest_bytes());

        trace!(time = event.time, seq = event.seq, kind = ?event.kind, "Dispatching event");
        Ok(Some(event))
    }

    /// Move the clock to `time` without dispatching anything
    ///
    /// Used to park the clock at a finite horizon once no more events are
    /// due. Does nothing if `time` is not ahead of the clock.
    pub fn advance_idle(&mut self, time: f64) -> Result<(), SchedulerError> {
        if time.is_finite() && time > self.clock.now() {
            self.clock.advance_to(time)?;
        }
        Ok(())
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if no events are pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of events dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Hex SHA-256 over `(due time, sequence, kind)` of every dispatched event
    pub fn trace_digest(&self) -> String {
        format!("{:x}", self.digest.clone().finalize())
    }
}
