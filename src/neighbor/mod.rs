//! Binned neighbor search over owned and ghost atoms.
mod bins;
mod neighbor_list;
mod settings;
mod special;

pub use bins::{Bins, Stencil};
pub use neighbor_list::{Neighbor, NeighborBuilder, NeighborList};
pub use settings::{ListPolicy, NeighborSettings, UpdateSettings};
pub use special::{SpecialBonds, SpecialTreatment};
