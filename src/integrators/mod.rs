mod verlet;
pub use verlet::Verlet;

use crate::atoms::AtomStore;

/// Time integration of the owned atoms, split around the force computation
pub trait Integrator: Send {
    /// Runs before forces are computed for the new positions
    fn initial_integrate(&mut self, atoms: &mut AtomStore, timestep: f64);
    /// Runs once the forces for the new positions are complete
    fn final_integrate(&mut self, atoms: &mut AtomStore, timestep: f64);
}
