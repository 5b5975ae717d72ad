use rand::Rng;

use super::Region;
use crate::utils::Axis;

/// Axis-aligned box, closed on every face
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    lo: [f64; 3],
    hi: [f64; 3],
}
impl Rect {
    pub fn new(xlo: f64, xhi: f64, ylo: f64, yhi: f64, zlo: f64, zhi: f64) -> Self {
        Self::from_corners([xlo, ylo, zlo], [xhi, yhi, zhi])
    }
    pub fn from_corners(lo: [f64; 3], hi: [f64; 3]) -> Self {
        assert!(
            lo.iter().zip(hi.iter()).all(|(l, h)| l <= h),
            "Lower corner {:?} should not exceed upper corner {:?}",
            lo,
            hi
        );
        Self { lo, hi }
    }
    pub fn lo(&self) -> [f64; 3] {
        self.lo
    }
    pub fn hi(&self) -> [f64; 3] {
        self.hi
    }
    pub fn get_bounds(&self, axis: Axis) -> [f64; 2] {
        [self.lo[axis.index()], self.hi[axis.index()]]
    }
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.hi[0] - self.lo[0],
            self.hi[1] - self.lo[1],
            self.hi[2] - self.lo[2],
        ]
    }
    pub fn volume(&self) -> f64 {
        let l = self.lengths();
        l[0] * l[1] * l[2]
    }
    /// The same box grown by `dist` on every face
    pub fn expanded(&self, dist: f64) -> Self {
        Self {
            lo: [self.lo[0] - dist, self.lo[1] - dist, self.lo[2] - dist],
            hi: [self.hi[0] + dist, self.hi[1] + dist, self.hi[2] + dist],
        }
    }
}
impl Region for Rect {
    fn contains(&self, coord: &[f64; 3]) -> bool {
        (0..3).all(|i| self.lo[i] <= coord[i] && coord[i] <= self.hi[i])
    }
    fn bounding_box(&self) -> Rect {
        *self
    }
    fn random_coord<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        let l = self.lengths();
        [
            rng.gen::<f64>() * l[0] + self.lo[0],
            rng.gen::<f64>() * l[1] + self.lo[1],
            rng.gen::<f64>() * l[2] + self.lo[2],
        ]
    }
}
