//! Built-in plugins: one pair style, a damping fix, a stop condition and
//! thermodynamic output.
mod halt;
mod lj_cut;
mod thermo;
mod viscous;

pub use halt::Halt;
pub use lj_cut::{LJCutCoeff, LjCut};
pub use thermo::Thermo;
pub use viscous::Viscous;
