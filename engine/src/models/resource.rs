//! Resource model: a service station with a server pool and a waiting line
//!
//! # Admission rules
//!
//! - A request is granted immediately only if it fits in the free server
//!   capacity AND nobody is waiting. A request never overtakes the queue.
//! - Otherwise it is appended to the FIFO queue if the queue has room.
//! - Otherwise it is rejected.
//! - A release admits waiting requests strictly from the head of the queue,
//!   stopping at the first one that does not fit.
//!
//! # Critical Invariants
//!
//! - `0 <= in_service <= capacity`
//! - `0 <= queue_count <= queue_capacity`

use crate::models::CursorId;
use crate::monitor::MonitorLevel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from resource bookkeeping
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("Release of {requested} units exceeds {in_service} units in service")]
    ReleaseExceedsInService { requested: u32, in_service: u32 },
}

/// Size of the waiting line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCapacity {
    Bounded(usize),
    Unbounded,
}

impl QueueCapacity {
    /// Whether a queue of `len` waiters can take one more
    pub fn has_room(&self, len: usize) -> bool {
        match self {
            QueueCapacity::Bounded(max) => len < *max,
            QueueCapacity::Unbounded => true,
        }
    }

    /// Bound on waiters, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            QueueCapacity::Bounded(max) => Some(*max),
            QueueCapacity::Unbounded => None,
        }
    }
}

impl From<Option<usize>> for QueueCapacity {
    fn from(value: Option<usize>) -> Self {
        value.map_or(QueueCapacity::Unbounded, QueueCapacity::Bounded)
    }
}

/// A request parked in a resource queue
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingRequest {
    /// Cursor to resume on admission
    pub cursor: CursorId,
    /// Units requested
    pub amount: u32,
    /// When the request joined the queue
    pub enqueued_at: f64,
}

/// Result of a seize attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeizeOutcome {
    /// Units taken; the caller continues at the same instant
    Granted,
    /// Request parked; `position` is 1-indexed
    Enqueued { position: usize },
    /// Queue full; the request was not recorded anywhere
    Rejected,
}

/// Service station
///
/// # Example
/// ```
/// use queue_simulator_core_rs::models::{CursorId, QueueCapacity, Resource, SeizeOutcome};
///
/// let mut server = Resource::new("server", 1, QueueCapacity::Bounded(1));
/// assert_eq!(server.try_seize(CursorId(0), 1, 0.0), SeizeOutcome::Granted);
/// assert_eq!(server.try_seize(CursorId(1), 1, 0.5), SeizeOutcome::Enqueued { position: 1 });
/// assert_eq!(server.try_seize(CursorId(2), 1, 0.7), SeizeOutcome::Rejected);
///
/// let admitted = server.release(1).unwrap();
/// assert_eq!(admitted[0].cursor, CursorId(1));
/// assert_eq!(server.server_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    capacity: u32,
    queue_capacity: QueueCapacity,
    in_service: u32,
    queue: VecDeque<WaitingRequest>,
    monitor: MonitorLevel,
}

impl Resource {
    /// Create an idle resource with monitoring enabled
    pub fn new(name: impl Into<String>, capacity: u32, queue_capacity: QueueCapacity) -> Self {
        Self {
            name: name.into(),
            capacity,
            queue_capacity,
            in_service: 0,
            queue: VecDeque::new(),
            monitor: MonitorLevel::Basic,
        }
    }

    /// Set the monitoring level (builder style)
    pub fn with_monitor(mut self, monitor: MonitorLevel) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn queue_capacity(&self) -> QueueCapacity {
        self.queue_capacity
    }

    pub fn monitor(&self) -> MonitorLevel {
        self.monitor
    }

    /// Units currently in service
    pub fn server_count(&self) -> u32 {
        self.in_service
    }

    /// Requests currently waiting
    pub fn queue_count(&self) -> usize {
        self.queue.len()
    }

    /// Free server units
    pub fn available(&self) -> u32 {
        self.capacity - self.in_service
    }

    /// Waiting requests, head first
    pub fn waiting(&self) -> impl Iterator<Item = &WaitingRequest> {
        self.queue.iter()
    }

    /// Attempt to take `amount` units for `cursor`
    ///
    /// A zero-unit request is granted at once, even behind a waiting queue.
    pub fn try_seize(&mut self, cursor: CursorId, amount: u32, now: f64) -> SeizeOutcome {
        if amount == 0 {
            return SeizeOutcome::Granted;
        }
        if self.queue.is_empty() && amount <= self.available() {
            self.in_service += amount;
            return SeizeOutcome::Granted;
        }

        if self.queue_capacity.has_room(self.queue.len()) {
            self.queue.push_back(WaitingRequest {
                cursor,
                amount,
                enqueued_at: now,
            });
            return SeizeOutcome::Enqueued {
                position: self.queue.len(),
            };
        }

        SeizeOutcome::Rejected
    }

    /// Give back `amount` units and admit waiting requests
    ///
    /// Returns the admitted requests in queue order; their units are already
    /// counted as in service.
    ///
    /// # Errors
    /// `ResourceError::ReleaseExceedsInService` if `amount` exceeds the units
    /// in service. No state changes in that case.
    pub fn release(&mut self, amount: u32) -> Result<Vec<WaitingRequest>, ResourceError> {
        if amount > self.in_service {
            return Err(ResourceError::ReleaseExceedsInService {
                requested: amount,
                in_service: self.in_service,
            });
        }
        self.in_service -= amount;
        Ok(self.admit_waiting())
    }

    /// Pop queue heads while they fit
    fn admit_waiting(&mut self) -> Vec<WaitingRequest> {
        let mut admitted = Vec::new();
        while let Some(head) = self.queue.front() {
            if head.amount > self.available() {
                break;
            }
            self.in_service += head.amount;
            if let Some(request) = self.queue.pop_front() {
                admitted.push(request);
            }
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_zero_queue_rejects_everything() {
        let mut resource = Resource::new("none", 0, QueueCapacity::Bounded(0));
        assert_eq!(resource.try_seize(CursorId(0), 1, 0.0), SeizeOutcome::Rejected);
        assert_eq!(resource.server_count(), 0);
        assert_eq!(resource.queue_count(), 0);
    }

    #[test]
    fn test_new_request_does_not_overtake_waiting_head() {
        let mut resource = Resource::new("r", 3, QueueCapacity::Unbounded);
        assert_eq!(resource.try_seize(CursorId(0), 2, 0.0), SeizeOutcome::Granted);
        // Head wants 2, only 1 free
        assert_eq!(
            resource.try_seize(CursorId(1), 2, 0.0),
            SeizeOutcome::Enqueued { position: 1 }
        );
        // 1 unit would fit, but someone is waiting
        assert_eq!(
            resource.try_seize(CursorId(2), 1, 0.0),
            SeizeOutcome::Enqueued { position: 2 }
        );
        assert_eq!(resource.server_count(), 2);
    }

    #[test]
    fn test_zero_request_granted_behind_full_queue() {
        let mut resource = Resource::new("r", 1, QueueCapacity::Bounded(1));
        assert_eq!(resource.try_seize(CursorId(0), 1, 0.0), SeizeOutcome::Granted);
        assert_eq!(
            resource.try_seize(CursorId(1), 1, 1.0),
            SeizeOutcome::Enqueued { position: 1 }
        );
        assert_eq!(resource.try_seize(CursorId(2), 0, 2.0), SeizeOutcome::Granted);
        assert_eq!(resource.server_count(), 1);
        assert_eq!(resource.queue_count(), 1);
    }

    #[test]
    fn test_release_stops_at_first_head_that_does_not_fit() {
        let mut resource = Resource::new("r", 3, QueueCapacity::Unbounded);
        resource.try_seize(CursorId(0), 3, 0.0);
        resource.try_seize(CursorId(1), 3, 0.0);
        resource.try_seize(CursorId(2), 1, 0.0);

        // 2 units free: head (3) does not fit, so nothing behind it moves
        let admitted = resource.release(2).unwrap();
        assert!(admitted.is_empty());
        assert_eq!(resource.queue_count(), 2);

        // All free: head gets 3, then 0 left for the 1-unit request
        let admitted = resource.release(1).unwrap();
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].cursor, CursorId(1));
        assert_eq!(resource.queue_count(), 1);
    }

    #[test]
    fn test_release_admits_several_heads() {
        let mut resource = Resource::new("r", 2, QueueCapacity::Unbounded);
        resource.try_seize(CursorId(0), 2, 0.0);
        resource.try_seize(CursorId(1), 1, 1.0);
        resource.try_seize(CursorId(2), 1, 2.0);

        let admitted = resource.release(2).unwrap();
        let cursors: Vec<CursorId> = admitted.iter().map(|w| w.cursor).collect();
        assert_eq!(cursors, vec![CursorId(1), CursorId(2)]);
        assert_eq!(resource.server_count(), 2);
    }

    #[test]
    fn test_over_release_is_error_without_side_effects() {
        let mut resource = Resource::new("r", 2, QueueCapacity::Unbounded);
        resource.try_seize(CursorId(0), 1, 0.0);
        assert_eq!(
            resource.release(2),
            Err(ResourceError::ReleaseExceedsInService {
                requested: 2,
                in_service: 1
            })
        );
        assert_eq!(resource.server_count(), 1);
    }

    #[test]
    fn test_queue_capacity_from_option() {
        assert_eq!(QueueCapacity::from(None), QueueCapacity::Unbounded);
        assert_eq!(QueueCapacity::from(Some(3)), QueueCapacity::Bounded(3));
        assert!(!QueueCapacity::Bounded(0).has_room(0));
    }
}
