//! Domain models for the simulation engine

pub mod arrival;
pub mod attributes;
pub mod ids;
pub mod resource;
pub mod trajectory;

// Re-exports
pub use arrival::{
    Arrival, ArrivalError, ArrivalOutcome, Cursor, ForkState, Frame, Holding, PendingSeize,
    Terminal,
};
pub use attributes::{AttributeMod, AttributeScope, Attributes};
pub use ids::{ArrivalId, CursorId, ForkId, GeneratorId, NodeId, ResourceId};
pub use resource::{QueueCapacity, Resource, ResourceError, SeizeOutcome, WaitingRequest};
pub use trajectory::{
    constant, Activity, Context, Continuation, MessageFn, Node, SelectorFn, Trajectory,
    TrajectoryBuilder, ValueFn,
};
