use crate::atoms::AtomStore;

/// Kinetic energy of the owned atoms
pub fn kinetic_energy(atoms: &AtomStore) -> f64 {
    0.5 * atoms.velocities()[..atoms.nlocal()]
        .iter()
        .enumerate()
        .map(|(i, v)| atoms.mass(i) * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]))
        .sum::<f64>()
}
