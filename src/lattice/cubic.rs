use crate::{region::Region, Error};

use super::Lattice;

/// Simple cubic lattice
#[derive(Debug)]
pub struct Cubic {
    a: f64,
}
impl Cubic {
    pub fn new(a: f64) -> Result<Self, Error> {
        Self::checked(a)
    }
    /// Lattice with `rho` points per unit volume
    pub fn from_density(rho: f64) -> Result<Self, Error> {
        Self::checked((1.0 / rho).cbrt())
    }
    fn checked(a: f64) -> Result<Self, Error> {
        if !(a > 0.0 && a.is_finite()) {
            return Err(Error::config(format!(
                "Lattice constant should be positive, found {}",
                a
            )));
        }
        Ok(Self { a })
    }
}
impl Lattice for Cubic {
    fn cell_lengths(&self) -> [f64; 3] {
        [self.a, self.a, self.a]
    }
    fn coords_within_region<R: Region>(&self, region: &R, origin: &[f64; 3]) -> Vec<[f64; 3]> {
        let bounding_box = region.bounding_box();
        let bblo = bounding_box.lo();
        let bbhi = bounding_box.hi();
        let mut first = [0i64; 3];
        let mut count = [0usize; 3];
        for d in 0..3 {
            first[d] = ((bblo[d] - origin[d]) / self.a).ceil() as i64;
            let last = ((bbhi[d] - origin[d]) / self.a).ceil() as i64 - 1;
            count[d] = (last - first[d] + 1).max(0) as usize;
        }
        let point = |d: usize, n: usize| origin[d] + self.a * (first[d] + n as i64) as f64;

        let mut coords: Vec<[f64; 3]> = Vec::with_capacity(count[0] * count[1] * count[2]);
        for i in 0..count[0] {
            for j in 0..count[1] {
                for k in 0..count[2] {
                    let x = [point(0, i), point(1, j), point(2, k)];
                    if region.contains(&x) && (0..3).all(|d| x[d] < bbhi[d]) {
                        coords.push(x);
                    }
                }
            }
        }
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Rect;

    #[test]
    fn fills_box_without_upper_faces() {
        let lattice = Cubic::new(2.0).unwrap();
        let coords = lattice.coords_within_region(&Rect::new(0.0, 10.0, 0.0, 10.0, 0.0, 4.0), &[0.0; 3]);
        assert_eq!(coords.len(), 5 * 5 * 2);
        assert!(coords.contains(&[8.0, 8.0, 2.0]));
        assert!(!coords.iter().any(|x| x[0] == 10.0));

        let shifted = lattice.coords_within_region(&Rect::new(0.0, 4.0, 0.0, 4.0, 0.0, 4.0), &[0.5; 3]);
        assert_eq!(shifted.len(), 8);
        assert_eq!(shifted[0], [0.5; 3]);
    }

    #[test]
    fn density_and_validation() {
        let lattice = Cubic::from_density(0.125).unwrap();
        assert!((lattice.cell_lengths()[0] - 2.0).abs() < 1e-12);
        assert!(Cubic::new(0.0).is_err());
    }
}
