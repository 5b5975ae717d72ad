use std::ops::Range;

use rayon::prelude::*;

use super::Special;
use crate::utils::add_assign;

/// Read-only view of an [`AtomStore`](super::AtomStore) taken while forces
/// are being accumulated
#[derive(Clone, Copy, Debug)]
pub struct AtomsRef<'a> {
    pub tags: &'a [u64],
    pub types: &'a [usize],
    pub positions: &'a [[f64; 3]],
    pub velocities: &'a [[f64; 3]],
    pub images: &'a [[i32; 3]],
    pub molecules: &'a [Option<u64>],
    pub specials: &'a [Vec<Special>],
    pub nlocal: usize,
    pub(super) masses: &'a [f64],
}
impl<'a> AtomsRef<'a> {
    pub fn nlocal(&self) -> usize {
        self.nlocal
    }
    pub fn nall(&self) -> usize {
        self.tags.len()
    }
    pub fn mass(&self, i: usize) -> f64 {
        self.masses[self.types[i] - 1]
    }
}

/// Add-only access to the force array of owned and ghost atoms
#[derive(Debug)]
pub struct ForceAccumulator<'a> {
    forces: &'a mut [[f64; 3]],
}
impl<'a> ForceAccumulator<'a> {
    pub(super) fn new(forces: &'a mut [[f64; 3]]) -> Self {
        Self { forces }
    }
    pub fn len(&self) -> usize {
        self.forces.len()
    }
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }
    pub fn get(&self, i: usize) -> [f64; 3] {
        self.forces[i]
    }
    pub fn add(&mut self, i: usize, f: [f64; 3]) {
        add_assign(&mut self.forces[i], &f);
    }

    /// Evaluate `kernel` for every atom index in `range` on the current rayon
    /// pool. Each worker writes into a private force buffer covering all
    /// atoms; the buffers are reduced and added to the shared array once the
    /// loop finishes. Returns the sum of the values returned by `kernel`
    /// (typically the potential energy).
    pub fn par_accumulate<F>(&mut self, range: Range<usize>, kernel: F) -> f64
    where
        F: Fn(usize, &mut [[f64; 3]]) -> f64 + Sync + Send,
    {
        let n = self.forces.len();
        let (buffer, total) = range
            .into_par_iter()
            .with_min_len(64)
            .fold(
                || (vec![[0.0; 3]; n], 0.0),
                |(mut buf, sum), i| {
                    let value = kernel(i, &mut buf);
                    (buf, sum + value)
                },
            )
            .reduce(
                || (vec![[0.0; 3]; n], 0.0),
                |(mut a, sum_a), (b, sum_b)| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        add_assign(x, y);
                    }
                    (a, sum_a + sum_b)
                },
            );
        for (f, b) in self.forces.iter_mut().zip(buffer.iter()) {
            add_assign(f, b);
        }
        total
    }
}
