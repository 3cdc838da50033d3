//! Event types for the scheduler queue

use crate::models::{CursorId, GeneratorId};
use std::cmp::Ordering;

/// What a dispatched event does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A generator fires: spawn one arrival and schedule the next spawn
    Spawn { generator: GeneratorId },

    /// A suspended cursor continues with its next activity
    Resume { cursor: CursorId },
}

impl EventKind {
    /// Stable byte encoding used by the trace digest
    pub(crate) fn digest_bytes(&self) -> [u8; 9] {
        let (tag, id) = match self {
            EventKind::Spawn { generator } => (0u8, generator.0 as u64),
            EventKind::Resume { cursor } => (1u8, cursor.0),
        };
        let mut bytes = [0u8; 9];
        bytes[0] = tag;
        bytes[1..].copy_from_slice(&id.to_le_bytes());
        bytes
    }
}

/// A scheduled event
///
/// Ordered by `time` ascending, ties broken by `seq` ascending. `seq` is
/// assigned by the scheduler and strictly increases, so two events never
/// share a key.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Due time
    pub time: f64,

    /// Scheduling sequence number
    pub seq: u64,

    /// Payload
    pub kind: EventKind,
}

impl Eq for Event {}

impl Ord for Event {
    // Reversed so that `BinaryHeap` (a max-heap) pops the earliest event
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
