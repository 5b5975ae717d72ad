//! Ranks, their communicators, and the spatial decomposition built on top.
mod communicator;
mod grid;
mod message;
mod partition;
mod universe;

pub use communicator::Communicator;
pub use grid::ProcGrid;
pub use message::{Message, Payload, Tag};
pub use partition::{CommPartition, Swap};
pub use universe::Universe;
