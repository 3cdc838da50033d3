//! Arrivals and their execution cursors
//!
//! An arrival is one logical process. It owns its attributes, its resource
//! holdings and the bookkeeping of its clone forks. The actual position in
//! the trajectory lives in one or more `Cursor`s: a plain arrival has one,
//! every `Clone` activity adds more. The arrival completes when its last
//! cursor terminates.

use crate::models::attributes::Attributes;
use crate::models::trajectory::Trajectory;
use crate::models::{ArrivalId, CursorId, ForkId, GeneratorId, NodeId, ResourceId};
use crate::monitor::MonitorLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// How an arrival (or one of its cursors) ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrivalOutcome {
    /// Reached the end of its trajectory
    Finished,
    /// Dropped by a `Leave` activity
    Left,
    /// Turned away by a full queue
    Rejected { resource: String },
    /// Terminated by a usage error
    Failed { reason: String },
}

impl ArrivalOutcome {
    /// Only a normal finish counts as finished
    pub fn is_finished(&self) -> bool {
        matches!(self, ArrivalOutcome::Finished)
    }

    /// Short label for logs and filters
    pub fn label(&self) -> &'static str {
        match self {
            ArrivalOutcome::Finished => "finished",
            ArrivalOutcome::Left => "left",
            ArrivalOutcome::Rejected { .. } => "rejected",
            ArrivalOutcome::Failed { .. } => "failed",
        }
    }
}

/// Usage errors. Fatal to the offending arrival only.
#[derive(Debug, Error, PartialEq)]
pub enum ArrivalError {
    #[error("Unknown resource '{0}'")]
    UnknownResource(String),

    #[error("Release of {requested} units on '{resource}' exceeds {held} held")]
    ReleaseExceedsHeld {
        resource: String,
        requested: u32,
        held: u32,
    },

    #[error("Invalid duration {0}")]
    InvalidDuration(f64),
}

/// Units an arrival holds on one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub amount: u32,
    /// When the first of the currently held units was requested
    pub requested_at: f64,
    /// When the first of the currently held units was granted
    pub granted_at: f64,
}

/// Snapshot taken when a cursor reaches a real terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    pub outcome: ArrivalOutcome,
    pub time: f64,
    pub activity_time: f64,
    pub waiting_time: f64,
}

/// Join point of one clone fork
///
/// `pending` counts member cursors that are alive and have not reached the
/// barrier yet.
#[derive(Debug, Clone, Default)]
pub struct ForkState {
    pub pending: usize,
    /// Cursors parked at a `wait = true` barrier, with the time they arrived
    pub parked: Vec<(CursorId, f64)>,
    /// A `wait = false` barrier already let its first cursor through
    pub passed: bool,
}

/// One logical process
#[derive(Debug, Clone)]
pub struct Arrival {
    pub id: ArrivalId,
    pub name: String,
    pub generator: GeneratorId,
    pub start_time: f64,
    pub monitor: MonitorLevel,
    pub attributes: Attributes,
    /// Cursors not yet terminated
    pub live_cursors: usize,
    pub holdings: BTreeMap<ResourceId, Holding>,
    /// Total queue wait per resource name
    pub resource_wait: BTreeMap<String, f64>,
    pub forks: HashMap<ForkId, ForkState>,
    pub terminal: Option<Terminal>,
}

impl Arrival {
    pub fn new(
        id: ArrivalId,
        name: String,
        generator: GeneratorId,
        start_time: f64,
        monitor: MonitorLevel,
    ) -> Self {
        Self {
            id,
            name,
            generator,
            start_time,
            monitor,
            attributes: Attributes::new(),
            live_cursors: 1,
            holdings: BTreeMap::new(),
            resource_wait: BTreeMap::new(),
            forks: HashMap::new(),
            terminal: None,
        }
    }

    /// Units held on `resource`
    pub fn held(&self, resource: ResourceId) -> u32 {
        self.holdings.get(&resource).map_or(0, |h| h.amount)
    }

    /// Record that `amount` units were granted on `resource`
    pub fn acquire(&mut self, resource: ResourceId, amount: u32, requested_at: f64, now: f64) {
        if amount == 0 {
            return;
        }
        let holding = self.holdings.entry(resource).or_insert(Holding {
            amount: 0,
            requested_at,
            granted_at: now,
        });
        if holding.amount == 0 {
            holding.requested_at = requested_at;
            holding.granted_at = now;
        }
        holding.amount += amount;
    }

    /// Remove `amount` held units on `resource`
    ///
    /// Returns the holding as it was before the release when this release
    /// brings the amount to zero, so the caller can emit a usage record.
    ///
    /// # Errors
    /// `ArrivalError::ReleaseExceedsHeld` if `amount` exceeds the held units
    pub fn give_back(
        &mut self,
        resource: ResourceId,
        resource_name: &str,
        amount: u32,
    ) -> Result<Option<Holding>, ArrivalError> {
        let held = self.held(resource);
        if amount > held {
            return Err(ArrivalError::ReleaseExceedsHeld {
                resource: resource_name.to_string(),
                requested: amount,
                held,
            });
        }
        if amount == held {
            return Ok(self.holdings.remove(&resource));
        }
        if let Some(holding) = self.holdings.get_mut(&resource) {
            holding.amount -= amount;
        }
        Ok(None)
    }

    /// Add queue wait on `resource`
    pub fn add_resource_wait(&mut self, resource_name: &str, wait: f64) {
        *self
            .resource_wait
            .entry(resource_name.to_string())
            .or_insert(0.0) += wait;
    }
}

/// Where a cursor goes when its current (sub-)trajectory runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Continue with this node
    Resume(NodeId),
    /// The path ends here
    Finish,
}

/// A request waiting in a resource queue
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSeize {
    pub resource: ResourceId,
    pub requested_at: f64,
}

/// Execution cursor
#[derive(Debug, Clone)]
pub struct Cursor {
    pub id: CursorId,
    pub arrival: ArrivalId,
    pub trajectory: Arc<Trajectory>,
    /// Next activity to execute
    pub node: Option<NodeId>,
    pub frames: Vec<Frame>,
    /// Enclosing clone forks, innermost last
    pub forks: Vec<ForkId>,
    /// Rollbacks taken per rollback node
    pub rollbacks: HashMap<NodeId, usize>,
    pub activity_time: f64,
    pub waiting_time: f64,
    pub pending: Option<PendingSeize>,
}

impl Cursor {
    pub fn new(id: CursorId, arrival: ArrivalId, trajectory: Arc<Trajectory>) -> Self {
        let node = trajectory.entry();
        Self {
            id,
            arrival,
            trajectory,
            node,
            frames: Vec::new(),
            forks: Vec::new(),
            rollbacks: HashMap::new(),
            activity_time: 0.0,
            waiting_time: 0.0,
            pending: None,
        }
    }

    /// Sibling created by a clone: same position, stack and accumulators
    pub fn sibling(&self, id: CursorId) -> Self {
        Self {
            id,
            pending: None,
            ..self.clone()
        }
    }

    /// Enter a sub-trajectory, returning to `after` when it ends if `merge`
    pub fn enter(&mut self, entry: Option<NodeId>, after: Option<NodeId>, merge: bool) {
        if !merge {
            self.frames.push(Frame::Finish);
        } else if let Some(after) = after {
            self.frames.push(Frame::Resume(after));
        }
        self.node = entry;
    }

    /// Resolve the node to execute next, popping return frames while the
    /// current path has run out
    ///
    /// Returns `None` when the cursor's path is over.
    pub fn unwind(&mut self) -> Option<NodeId> {
        while self.node.is_none() {
            match self.frames.pop() {
                Some(Frame::Resume(next)) => self.node = Some(next),
                Some(Frame::Finish) | None => return None,
            }
        }
        self.node
    }
}
