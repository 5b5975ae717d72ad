pub use super::atoms::{Atom, AtomStore, FloatField, PerAtomField, SpecialLevel};
pub use super::compute::{Quantity, ThermoState};
pub use super::config::{CommSettings, RunConfig, SimConfig, StyleConfig};
pub use super::domain::{Domain, BC};
pub use super::lattice::{Cubic, Lattice};
pub use super::neighbor::{ListPolicy, NeighborSettings, SpecialBonds};
pub use super::parallel::{Communicator, Universe};
pub use super::plugin::{Control, Hooks, Plugin};
pub use super::region::{Rect, Region};
pub use super::registry::StyleRegistry;
pub use super::simulation::{RunSummary, Simulation};
pub use super::Error;
