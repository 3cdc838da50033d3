//! Trajectories: immutable activity graphs walked by arrivals
//!
//! A trajectory is an arena of `Node`s addressed by `NodeId`. Every node
//! points at its successor; sub-trajectories handed to `branch`, `clone` or
//! `seize_or_else` are spliced into the same arena, so a cursor is nothing
//! more than a `NodeId` plus a stack of return points.
//!
//! Trajectories are never mutated once built and are shared between
//! generators (and simulation instances) through `Arc`.
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::models::TrajectoryBuilder;
//!
//! let customer = TrajectoryBuilder::new("customer")
//!     .seize("counter", 1)
//!     .timeout_with(|ctx| ctx.rng().exponential(4.0))
//!     .release("counter", 1)
//!     .build();
//!
//! assert_eq!(customer.len(), 3);
//! ```

use crate::models::attributes::{AttributeMod, AttributeScope, Attributes};
use crate::models::NodeId;
use crate::rng::RngManager;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Callables
// ============================================================================

/// What a callable sees when the engine evaluates it
///
/// Callables are opaque to the engine: it only asks them for a number (a
/// duration, a probability, an attribute value) or an index.
pub struct Context<'a> {
    now: f64,
    attributes: &'a Attributes,
    globals: &'a Attributes,
    rng: &'a mut RngManager,
}

impl<'a> Context<'a> {
    pub fn new(
        now: f64,
        attributes: &'a Attributes,
        globals: &'a Attributes,
        rng: &'a mut RngManager,
    ) -> Self {
        Self {
            now,
            attributes,
            globals,
            rng,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Attribute of the executing arrival
    pub fn attribute(&self, key: &str) -> Option<f64> {
        self.attributes.get(key)
    }

    /// Attribute of the executing arrival, or `default` if unset
    pub fn attribute_or(&self, key: &str, default: f64) -> f64 {
        self.attributes.get_or(key, default)
    }

    /// Simulation-wide attribute
    pub fn global(&self, key: &str) -> Option<f64> {
        self.globals.get(key)
    }

    pub fn attributes(&self) -> &Attributes {
        self.attributes
    }

    /// The instance's random stream
    pub fn rng(&mut self) -> &mut RngManager {
        &mut *self.rng
    }
}

/// Produces a number (duration, probability, attribute value)
pub type ValueFn = Arc<dyn Fn(&mut Context<'_>) -> f64 + Send + Sync>;

/// Produces a 0-based continuation index
pub type SelectorFn = Arc<dyn Fn(&mut Context<'_>) -> usize + Send + Sync>;

/// Produces a log message
pub type MessageFn = Arc<dyn Fn(&mut Context<'_>) -> String + Send + Sync>;

/// Wrap a constant as a `ValueFn`
pub fn constant(value: f64) -> ValueFn {
    Arc::new(move |_: &mut Context<'_>| value)
}

// ============================================================================
// Activities
// ============================================================================

/// Entry into a spliced sub-trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// First node; `None` for an empty sub-trajectory
    pub entry: Option<NodeId>,
    /// Return to the activity after the forking one when the sub-trajectory ends
    pub merge: bool,
}

impl Continuation {
    fn relocated(self, offset: usize) -> Self {
        Self {
            entry: shift(self.entry, offset),
            merge: self.merge,
        }
    }
}

/// One step of a trajectory
#[derive(Clone)]
pub enum Activity {
    /// Take `amount` units; wait in the queue or get rejected if they are not free
    Seize {
        resource: String,
        amount: u32,
        /// Taken instead of terminating the arrival when the queue is full
        on_reject: Option<Continuation>,
    },

    /// Give back `amount` units (`None`: everything the arrival holds there)
    Release { resource: String, amount: Option<u32> },

    /// Suspend for a non-negative duration
    Timeout { duration: ValueFn },

    /// Write an attribute
    SetAttribute {
        key: String,
        value: ValueFn,
        scope: AttributeScope,
        modifier: AttributeMod,
    },

    /// Route to exactly one continuation
    Branch {
        selector: SelectorFn,
        continuations: Vec<Continuation>,
    },

    /// Terminate the arrival with the given probability
    Leave { probability: ValueFn },

    /// Fork into `n` cursors; cursor i follows `continuations[i]` if present
    Clone {
        n: usize,
        continuations: Vec<Option<NodeId>>,
    },

    /// Barrier joining the cursors of the innermost clone
    Synchronize { wait: bool },

    /// Jump back to `target`, at most `times` times per arrival
    Rollback { target: NodeId, times: Option<usize> },

    /// Emit a log line
    Log { message: MessageFn },
}

impl Activity {
    /// Short name of the activity kind
    pub fn kind(&self) -> &'static str {
        match self {
            Activity::Seize { .. } => "Seize",
            Activity::Release { .. } => "Release",
            Activity::Timeout { .. } => "Timeout",
            Activity::SetAttribute { .. } => "SetAttribute",
            Activity::Branch { .. } => "Branch",
            Activity::Leave { .. } => "Leave",
            Activity::Clone { .. } => "Clone",
            Activity::Synchronize { .. } => "Synchronize",
            Activity::Rollback { .. } => "Rollback",
            Activity::Log { .. } => "Log",
        }
    }

    /// Shift every node reference by `offset` (used when splicing)
    fn relocated(mut self, offset: usize) -> Self {
        match &mut self {
            Activity::Seize { on_reject, .. } => {
                *on_reject = on_reject.map(|c| c.relocated(offset));
            }
            Activity::Branch { continuations, .. } => {
                for continuation in continuations.iter_mut() {
                    *continuation = continuation.relocated(offset);
                }
            }
            Activity::Clone { continuations, .. } => {
                for entry in continuations.iter_mut() {
                    *entry = shift(*entry, offset);
                }
            }
            Activity::Rollback { target, .. } => {
                *target = NodeId(target.0 + offset);
            }
            Activity::Release { .. }
            | Activity::Timeout { .. }
            | Activity::SetAttribute { .. }
            | Activity::Leave { .. }
            | Activity::Synchronize { .. }
            | Activity::Log { .. } => {}
        }
        self
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Seize {
                resource,
                amount,
                on_reject,
            } => f
                .debug_struct("Seize")
                .field("resource", resource)
                .field("amount", amount)
                .field("on_reject", on_reject)
                .finish(),
            Activity::Release { resource, amount } => f
                .debug_struct("Release")
                .field("resource", resource)
                .field("amount", amount)
                .finish(),
            Activity::SetAttribute {
                key,
                scope,
                modifier,
                ..
            } => f
                .debug_struct("SetAttribute")
                .field("key", key)
                .field("scope", scope)
                .field("modifier", modifier)
                .finish_non_exhaustive(),
            Activity::Branch { continuations, .. } => f
                .debug_struct("Branch")
                .field("continuations", continuations)
                .finish_non_exhaustive(),
            Activity::Clone { n, continuations } => f
                .debug_struct("Clone")
                .field("n", n)
                .field("continuations", continuations)
                .finish(),
            Activity::Synchronize { wait } => {
                f.debug_struct("Synchronize").field("wait", wait).finish()
            }
            Activity::Rollback { target, times } => f
                .debug_struct("Rollback")
                .field("target", target)
                .field("times", times)
                .finish(),
            other => write!(f, "{}(<fn>)", other.kind()),
        }
    }
}

fn shift(id: Option<NodeId>, offset: usize) -> Option<NodeId> {
    id.map(|n| NodeId(n.0 + offset))
}

// ============================================================================
// Trajectory
// ============================================================================

/// Arena slot: an activity and its successor
#[derive(Debug, Clone)]
pub struct Node {
    pub activity: Activity,
    /// `None` ends the current (sub-)trajectory
    pub next: Option<NodeId>,
}

/// Immutable activity graph
#[derive(Debug, Clone)]
pub struct Trajectory {
    name: String,
    nodes: Vec<Node>,
    entry: Option<NodeId>,
    /// Nodes of the top-level path, in order
    main: Vec<NodeId>,
}

impl Trajectory {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First activity, `None` for an empty trajectory
    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Total activities including spliced sub-trajectories
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Activity kinds along the top-level path
    pub fn main_path(&self) -> Vec<&'static str> {
        self.main
            .iter()
            .filter_map(|id| self.node(*id))
            .map(|node| node.activity.kind())
            .collect()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Ordered construction of a `Trajectory`
#[derive(Debug, Clone)]
pub struct TrajectoryBuilder {
    name: String,
    nodes: Vec<Node>,
    entry: Option<NodeId>,
    main: Vec<NodeId>,
}

impl TrajectoryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            entry: None,
            main: Vec::new(),
        }
    }

    /// Append an activity to the top-level path
    pub fn activity(mut self, activity: Activity) -> Self {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            activity,
            next: None,
        });
        self.link(id);
        self.main.push(id);
        self
    }

    /// Make `id` the successor of the current tail
    fn link(&mut self, id: NodeId) {
        match self.main.last() {
            Some(tail) => self.nodes[tail.0].next = Some(id),
            None => self.entry = Some(id),
        }
    }

    /// Copy `sub` into this arena, returning its relocated entry
    fn splice(&mut self, sub: &Trajectory) -> Option<NodeId> {
        let offset = self.nodes.len();
        self.nodes.extend(sub.nodes.iter().cloned().map(|node| Node {
            activity: node.activity.relocated(offset),
            next: shift(node.next, offset),
        }));
        shift(sub.entry, offset)
    }

    pub fn seize(self, resource: impl Into<String>, amount: u32) -> Self {
        self.activity(Activity::Seize {
            resource: resource.into(),
            amount,
            on_reject: None,
        })
    }

    /// Seize, following `reject` instead of terminating when the queue is full
    pub fn seize_or_else(
        mut self,
        resource: impl Into<String>,
        amount: u32,
        reject: &Trajectory,
        merge: bool,
    ) -> Self {
        let entry = self.splice(reject);
        self.activity(Activity::Seize {
            resource: resource.into(),
            amount,
            on_reject: Some(Continuation { entry, merge }),
        })
    }

    pub fn release(self, resource: impl Into<String>, amount: u32) -> Self {
        self.activity(Activity::Release {
            resource: resource.into(),
            amount: Some(amount),
        })
    }

    /// Release everything the arrival holds on `resource`
    pub fn release_all(self, resource: impl Into<String>) -> Self {
        self.activity(Activity::Release {
            resource: resource.into(),
            amount: None,
        })
    }

    /// Fixed-length timeout
    pub fn timeout(self, duration: f64) -> Self {
        self.activity(Activity::Timeout {
            duration: constant(duration),
        })
    }

    pub fn timeout_with<F>(self, duration: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> f64 + Send + Sync + 'static,
    {
        self.activity(Activity::Timeout {
            duration: Arc::new(duration),
        })
    }

    /// Replace an arrival attribute
    pub fn set_attribute<F>(self, key: impl Into<String>, value: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> f64 + Send + Sync + 'static,
    {
        self.set_attribute_mod(key, AttributeScope::Arrival, AttributeMod::Replace, value)
    }

    /// Replace a global attribute
    pub fn set_global<F>(self, key: impl Into<String>, value: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> f64 + Send + Sync + 'static,
    {
        self.set_attribute_mod(key, AttributeScope::Global, AttributeMod::Replace, value)
    }

    pub fn set_attribute_mod<F>(
        self,
        key: impl Into<String>,
        scope: AttributeScope,
        modifier: AttributeMod,
        value: F,
    ) -> Self
    where
        F: Fn(&mut Context<'_>) -> f64 + Send + Sync + 'static,
    {
        self.activity(Activity::SetAttribute {
            key: key.into(),
            value: Arc::new(value),
            scope,
            modifier,
        })
    }

    /// Route to one of `continuations`, each with its merge flag
    pub fn branch<F>(mut self, selector: F, continuations: Vec<(&Trajectory, bool)>) -> Self
    where
        F: Fn(&mut Context<'_>) -> usize + Send + Sync + 'static,
    {
        let continuations = continuations
            .into_iter()
            .map(|(sub, merge)| Continuation {
                entry: self.splice(sub),
                merge,
            })
            .collect();
        self.activity(Activity::Branch {
            selector: Arc::new(selector),
            continuations,
        })
    }

    /// Leave with a fixed probability
    pub fn leave(self, probability: f64) -> Self {
        self.activity(Activity::Leave {
            probability: constant(probability),
        })
    }

    pub fn leave_with<F>(self, probability: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> f64 + Send + Sync + 'static,
    {
        self.activity(Activity::Leave {
            probability: Arc::new(probability),
        })
    }

    /// Fork into `n` cursors (`n` of 0 is treated as 1)
    pub fn clone_into(mut self, n: usize, continuations: Vec<&Trajectory>) -> Self {
        let continuations = continuations
            .into_iter()
            .map(|sub| self.splice(sub))
            .collect();
        self.activity(Activity::Clone {
            n: n.max(1),
            continuations,
        })
    }

    pub fn synchronize(self, wait: bool) -> Self {
        self.activity(Activity::Synchronize { wait })
    }

    /// Jump back `steps` activities on this path (clamped to its start)
    pub fn rollback(self, steps: usize, times: Option<usize>) -> Self {
        let here = self.main.len();
        let index = here.saturating_sub(steps.max(1));
        let target = self.main.get(index).copied().unwrap_or(NodeId(0));
        self.activity(Activity::Rollback { target, times })
    }

    pub fn log<F>(self, message: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> String + Send + Sync + 'static,
    {
        self.activity(Activity::Log {
            message: Arc::new(message),
        })
    }

    /// Append every top-level activity of `other` to this path
    pub fn join(mut self, other: &Trajectory) -> Self {
        let offset = self.nodes.len();
        let entry = self.splice(other);
        if let Some(entry) = entry {
            self.link(entry);
            self.main
                .extend(other.main.iter().map(|id| NodeId(id.0 + offset)));
        }
        self
    }

    pub fn build(self) -> Trajectory {
        Trajectory {
            name: self.name,
            nodes: self.nodes,
            entry: self.entry,
            main: self.main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_path_links_in_order() {
        let t = TrajectoryBuilder::new("t")
            .seize("r", 1)
            .timeout(1.0)
            .release("r", 1)
            .build();

        let first = t.entry().unwrap();
        let second = t.node(first).unwrap().next.unwrap();
        let third = t.node(second).unwrap().next.unwrap();
        assert!(t.node(third).unwrap().next.is_none());
        assert_eq!(t.main_path(), vec!["Seize", "Timeout", "Release"]);
    }

    #[test]
    fn test_branch_splices_sub_trajectories() {
        let left = TrajectoryBuilder::new("left").timeout(1.0).timeout(2.0).build();
        let right = TrajectoryBuilder::new("right").timeout(3.0).build();

        let t = TrajectoryBuilder::new("main")
            .timeout(0.5)
            .branch(|_| 0, vec![(&left, true), (&right, false)])
            .build();

        assert_eq!(t.len(), 5);
        assert_eq!(t.main_path(), vec!["Timeout", "Branch"]);

        let branch = t.main.last().and_then(|id| t.node(*id)).unwrap();
        let Activity::Branch { continuations, .. } = &branch.activity else {
            panic!("expected branch");
        };
        // left was spliced at offset 1, right at offset 3
        assert_eq!(continuations[0].entry, Some(NodeId(1)));
        assert_eq!(t.node(NodeId(1)).unwrap().next, Some(NodeId(2)));
        assert_eq!(continuations[1].entry, Some(NodeId(3)));
        assert!(!continuations[1].merge);
    }

    #[test]
    fn test_nested_splice_relocates_inner_references() {
        let inner = TrajectoryBuilder::new("inner").timeout(1.0).build();
        let middle = TrajectoryBuilder::new("middle")
            .branch(|_| 0, vec![(&inner, true)])
            .build();
        let outer = TrajectoryBuilder::new("outer")
            .timeout(1.0)
            .branch(|_| 0, vec![(&middle, true)])
            .build();

        // outer: [timeout(0), inner timeout(1), middle branch(2), outer branch(3)]
        let Activity::Branch { continuations, .. } = &outer.node(NodeId(2)).unwrap().activity
        else {
            panic!("expected branch");
        };
        assert_eq!(continuations[0].entry, Some(NodeId(1)));
    }

    #[test]
    fn test_rollback_targets_earlier_main_node_and_clamps() {
        let t = TrajectoryBuilder::new("t")
            .timeout(1.0)
            .timeout(2.0)
            .rollback(1, Some(2))
            .rollback(10, None)
            .build();

        let Activity::Rollback { target, times } = t.node(NodeId(2)).unwrap().activity.clone()
        else {
            panic!("expected rollback");
        };
        assert_eq!(target, NodeId(1));
        assert_eq!(times, Some(2));

        let Activity::Rollback { target, .. } = t.node(NodeId(3)).unwrap().activity.clone() else {
            panic!("expected rollback");
        };
        assert_eq!(target, NodeId(0));
    }

    #[test]
    fn test_join_appends_main_path() {
        let tail = TrajectoryBuilder::new("tail").timeout(1.0).leave(0.5).build();
        let t = TrajectoryBuilder::new("t").seize("r", 1).join(&tail).release("r", 1).build();

        assert_eq!(t.main_path(), vec!["Seize", "Timeout", "Leave", "Release"]);
    }

    #[test]
    fn test_empty_sub_trajectory_has_no_entry() {
        let empty = TrajectoryBuilder::new("empty").build();
        let t = TrajectoryBuilder::new("t").clone_into(2, vec![&empty]).build();
        let Activity::Clone { n, continuations } = &t.node(NodeId(0)).unwrap().activity else {
            panic!("expected clone");
        };
        assert_eq!(*n, 2);
        assert_eq!(continuations, &vec![None]);
    }

    #[test]
    fn test_debug_hides_closures() {
        let t = TrajectoryBuilder::new("t").timeout(1.0).build();
        let text = format!("{:?}", t.node(NodeId(0)).unwrap().activity);
        assert_eq!(text, "Timeout(<fn>)");
    }
}
