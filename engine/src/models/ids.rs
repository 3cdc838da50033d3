//! Typed indices for simulation entities
//!
//! Entities live in arenas owned by the simulation instance; everything else
//! refers to them through these copyable handles.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// One arrival (logical process)
    ArrivalId(u64)
);
id_type!(
    /// One execution cursor of an arrival; clones add cursors
    CursorId(u64)
);
id_type!(
    /// Position of a generator in the simulation
    GeneratorId(usize)
);
id_type!(
    /// Position of a resource in the simulation
    ResourceId(usize)
);
id_type!(
    /// Index of an activity node inside a trajectory arena
    NodeId(usize)
);
id_type!(
    /// One clone fork; synchronize barriers join on it
    ForkId(u64)
);
