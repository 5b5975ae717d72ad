use super::*;

/// Velocity-verlet integrator
#[derive(Clone, Copy, Debug, Default)]
pub struct Verlet;

impl Verlet {
    /// Steps the velocities of the owned atoms by half a timestep
    fn increment_velocity_halfstep(atoms: &mut AtomStore, timestep: f64) {
        let half_ts = 0.5 * timestep;
        let nlocal = atoms.nlocal();
        let scale: Vec<f64> = (0..nlocal).map(|i| half_ts / atoms.mass(i)).collect();
        let forces: Vec<[f64; 3]> = atoms.forces()[..nlocal].to_vec();
        for ((v, f), s) in atoms.velocities_mut()[..nlocal]
            .iter_mut()
            .zip(forces)
            .zip(scale)
        {
            v[0] += s * f[0];
            v[1] += s * f[1];
            v[2] += s * f[2];
        }
    }
    /// Steps the positions of the owned atoms forward
    fn increment_positions(atoms: &mut AtomStore, timestep: f64) {
        let nlocal = atoms.nlocal();
        let velocities: Vec<[f64; 3]> = atoms.velocities()[..nlocal].to_vec();
        for (x, v) in atoms.positions_mut()[..nlocal].iter_mut().zip(velocities) {
            x[0] += timestep * v[0];
            x[1] += timestep * v[1];
            x[2] += timestep * v[2];
        }
    }
}

impl Integrator for Verlet {
    fn initial_integrate(&mut self, atoms: &mut AtomStore, timestep: f64) {
        Verlet::increment_velocity_halfstep(atoms, timestep);
        Verlet::increment_positions(atoms, timestep);
    }
    fn final_integrate(&mut self, atoms: &mut AtomStore, timestep: f64) {
        Verlet::increment_velocity_halfstep(atoms, timestep);
    }
}
