use super::Domain;
use crate::{region::Rect, Error};

fn split(i: usize, n: usize) -> f64 {
    if i >= n {
        1.0
    } else {
        i as f64 / n as f64
    }
}

/// The part of the box owned by one rank of a `px x py x pz` processor grid,
/// stored as a half-open box `[lo, hi)` in lamda coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct SubDomain {
    lo: [f64; 3],
    hi: [f64; 3],
    grid_idx: [usize; 3],
    dims: [usize; 3],
    bounding_box: Rect,
}
impl SubDomain {
    pub fn of(domain: &Domain, dims: [usize; 3], grid_idx: [usize; 3]) -> Self {
        let lo = [
            split(grid_idx[0], dims[0]),
            split(grid_idx[1], dims[1]),
            split(grid_idx[2], dims[2]),
        ];
        let hi = [
            split(grid_idx[0] + 1, dims[0]),
            split(grid_idx[1] + 1, dims[1]),
            split(grid_idx[2] + 1, dims[2]),
        ];

        let mut bblo = [f64::MAX; 3];
        let mut bbhi = [f64::MIN; 3];
        for corner in 0..8 {
            let l = [
                if corner & 1 == 0 { lo[0] } else { hi[0] },
                if corner & 2 == 0 { lo[1] } else { hi[1] },
                if corner & 4 == 0 { lo[2] } else { hi[2] },
            ];
            let x = domain.cartesian_from_lamda(&l);
            for k in 0..3 {
                bblo[k] = bblo[k].min(x[k]);
                bbhi[k] = bbhi[k].max(x[k]);
            }
        }
        Self {
            lo,
            hi,
            grid_idx,
            dims,
            bounding_box: Rect::from_corners(bblo, bbhi),
        }
    }

    pub fn lo(&self) -> [f64; 3] {
        self.lo
    }
    pub fn hi(&self) -> [f64; 3] {
        self.hi
    }
    pub fn grid_idx(&self) -> [usize; 3] {
        self.grid_idx
    }
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }
    pub fn width(&self, dim: usize) -> f64 {
        self.hi[dim] - self.lo[dim]
    }
    /// Cartesian bounding box of the sub-domain (exact for orthogonal boxes)
    pub fn bounding_box(&self) -> &Rect {
        &self.bounding_box
    }
    pub fn is_first(&self, dim: usize) -> bool {
        self.grid_idx[dim] == 0
    }
    pub fn is_last(&self, dim: usize) -> bool {
        self.grid_idx[dim] + 1 == self.dims[dim]
    }

    /// The coordinate lies below this sub-domain along `dim`.
    ///
    /// The outer faces of the first and last sub-domain in each dimension
    /// are open, so roundoff on the global boundary never leaves an atom
    /// without an owner.
    pub fn is_below(&self, lamda: f64, dim: usize) -> bool {
        !self.is_first(dim) && lamda < self.lo[dim]
    }
    pub fn is_above(&self, lamda: f64, dim: usize) -> bool {
        !self.is_last(dim) && lamda >= self.hi[dim]
    }
    /// Grid index along `dim` of the sub-domain holding `lamda`, using the
    /// same faces as [`is_below`](Self::is_below) and [`is_above`](Self::is_above)
    pub fn owner_along(&self, lamda: f64, dim: usize) -> usize {
        let n = self.dims[dim];
        (1..n).filter(|&i| lamda >= split(i, n)).count()
    }
    pub fn owns_lamda(&self, lamda: &[f64; 3]) -> bool {
        (0..3).all(|d| !self.is_below(lamda[d], d) && !self.is_above(lamda[d], d))
    }
    pub fn owns(&self, domain: &Domain, x: &[f64; 3]) -> bool {
        self.owns_lamda(&domain.lamda_from_cartesian(x))
    }
}

/// Verify that a set of sub-domains tiles the unit lamda cube with no gap
/// and no overlap
pub fn check_tiling(subdomains: &[SubDomain]) -> Result<(), Error> {
    let mut volume = 0.0;
    for (i, sub) in subdomains.iter().enumerate() {
        for d in 0..3 {
            if !(0.0 <= sub.lo[d] && sub.lo[d] < sub.hi[d] && sub.hi[d] <= 1.0) {
                return Err(Error::decomposition(format!(
                    "Sub-domain {} has invalid extent [{}, {}) along axis {}",
                    i, sub.lo[d], sub.hi[d], d
                )));
            }
        }
        volume += sub.width(0) * sub.width(1) * sub.width(2);
        for (j, other) in subdomains.iter().enumerate().skip(i + 1) {
            let overlap = (0..3).all(|d| sub.lo[d] < other.hi[d] && other.lo[d] < sub.hi[d]);
            if overlap {
                return Err(Error::decomposition(format!(
                    "Sub-domains {} and {} overlap",
                    i, j
                )));
            }
        }
    }
    if (volume - 1.0).abs() > 1e-9 {
        return Err(Error::decomposition(format!(
            "Sub-domains cover {} of the box instead of all of it",
            volume
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::BC, utils::Index};

    fn all_subdomains(domain: &Domain, dims: [usize; 3]) -> Vec<SubDomain> {
        (0..dims[0] * dims[1] * dims[2])
            .map(|r| SubDomain::of(domain, dims, Index::from_linear(r, &dims).to_3d()))
            .collect()
    }

    #[test]
    fn grid_tiles_the_box() {
        let domain =
            Domain::triclinic([0.0; 3], [9.0, 7.0, 5.0], [1.0, 0.5, -0.5], [BC::PP; 3]).unwrap();
        for dims in [[1, 1, 1], [2, 1, 1], [3, 2, 1], [2, 3, 5]] {
            check_tiling(&all_subdomains(&domain, dims)).unwrap();
        }
    }

    #[test]
    fn neighbors_share_exact_edges() {
        let domain = Domain::orthogonal([0.0; 3], [1.0; 3], [BC::PP; 3]).unwrap();
        let subs = all_subdomains(&domain, [3, 1, 1]);
        assert_eq!(subs[0].hi()[0], subs[1].lo()[0]);
        assert_eq!(subs[1].hi()[0], subs[2].lo()[0]);
        assert_eq!(subs[2].hi()[0], 1.0);
    }

    #[test]
    fn every_point_has_exactly_one_owner() {
        let domain = Domain::orthogonal([0.0; 3], [10.0; 3], [BC::PP; 3]).unwrap();
        let subs = all_subdomains(&domain, [2, 2, 1]);
        for x in [
            [0.0, 0.0, 0.0],
            [5.0, 5.0, 5.0],
            [10.0, 10.0, 10.0],
            [-1e-15, 4.999, 2.0],
            [7.3, 1.2, 9.9],
        ] {
            let owners = subs.iter().filter(|s| s.owns(&domain, &x)).count();
            assert_eq!(owners, 1, "{:?}", x);
        }
    }

    #[test]
    fn detects_overlap() {
        let domain = Domain::orthogonal([0.0; 3], [10.0; 3], [BC::PP; 3]).unwrap();
        let mut subs = all_subdomains(&domain, [2, 1, 1]);
        subs[1] = subs[0].clone();
        assert!(matches!(check_tiling(&subs), Err(Error::Decomposition(_))));
    }
}
