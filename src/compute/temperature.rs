/// Degrees of freedom of `natoms` atoms with the center of mass fixed
pub fn degrees_of_freedom(natoms: usize) -> usize {
    (3 * natoms).saturating_sub(3)
}

/// Temperature in reduced units (k_B = 1) from the global kinetic energy
pub fn temperature(kinetic_energy: f64, natoms: usize) -> f64 {
    match degrees_of_freedom(natoms) {
        0 => 0.0,
        dof => 2.0 * kinetic_energy / dof as f64,
    }
}
