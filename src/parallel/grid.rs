use crate::{
    domain::{Domain, SubDomain},
    utils::{Axis, Direction, Index},
    Error,
};

/// Determine the configuration of processes that minimizes the surface
/// area between sub-domains. Ties go to the grid with more ranks along x,
/// then along y.
fn procs_in_box(nprocs: usize, lengths: [f64; 3]) -> [usize; 3] {
    let [lx, ly, lz] = lengths;
    // Proportional to the total surface area of the sub-domains
    let score = |nx: usize, ny: usize, nz: usize| {
        lx * ly / (nx * ny) as f64 + ly * lz / (ny * nz) as f64 + lx * lz / (nx * nz) as f64
    };

    let factors: Vec<usize> = (1..=nprocs).rev().filter(|i| nprocs % i == 0).collect();
    let mut best = [nprocs, 1, 1];
    let mut best_score = f64::MAX;
    for &nx in &factors {
        for &ny in factors.iter().filter(|&&ny| (nprocs / nx) % ny == 0) {
            let nz = nprocs / nx / ny;
            let s = score(nx, ny, nz);
            if s < best_score * (1.0 - 1e-12) {
                best = [nx, ny, nz];
                best_score = s;
            }
        }
    }
    best
}

/// The `px x py x pz` arrangement of ranks and this rank's place in it.
/// Ranks are laid out x-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcGrid {
    dims: [usize; 3],
    rank: usize,
    idx: [usize; 3],
    /// Indexed by [`Direction::index`]
    neighbors: [Option<usize>; 6],
}
impl ProcGrid {
    /// Lay out `nranks` ranks over the box, either as requested or by
    /// minimizing the communication surface
    pub fn new(
        nranks: usize,
        rank: usize,
        domain: &Domain,
        requested: Option<[usize; 3]>,
    ) -> Result<Self, Error> {
        if rank >= nranks {
            return Err(Error::decomposition(format!(
                "Rank {} outside a universe of {}",
                rank, nranks
            )));
        }
        let dims = match requested {
            Some(dims) => {
                if dims.contains(&0) || dims.iter().product::<usize>() != nranks {
                    return Err(Error::decomposition(format!(
                        "Processor grid {:?} does not match {} ranks",
                        dims, nranks
                    )));
                }
                dims
            }
            None => procs_in_box(nranks, domain.prd()),
        };
        let idx = Index::from_linear(rank, &dims).to_3d();
        let mut neighbors = [None; 6];
        for direction in Direction::ALL {
            neighbors[direction.index()] = get_3d_neighbor(&idx, &dims, direction, domain)
                .map(|n| Index::from_3d(&n, &dims).idx());
        }
        Ok(Self {
            dims,
            rank,
            idx,
            neighbors,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }
    pub fn nranks(&self) -> usize {
        self.dims.iter().product()
    }
    pub fn rank(&self) -> usize {
        self.rank
    }
    pub fn idx(&self) -> [usize; 3] {
        self.idx
    }
    /// Rank across the given face, `None` at a non-periodic boundary
    pub fn neighbor(&self, direction: Direction) -> Option<usize> {
        self.neighbors[direction.index()]
    }
    pub fn subdomain(&self, domain: &Domain) -> SubDomain {
        SubDomain::of(domain, self.dims, self.idx)
    }
    /// Sub-domains of every rank, in rank order
    pub fn subdomains(&self, domain: &Domain) -> Vec<SubDomain> {
        (0..self.nranks())
            .map(|r| SubDomain::of(domain, self.dims, Index::from_linear(r, &self.dims).to_3d()))
            .collect()
    }
}

fn get_3d_neighbor(
    my_idx: &[usize; 3],
    dims: &[usize; 3],
    direction: Direction,
    domain: &Domain,
) -> Option<[usize; 3]> {
    let axis_index = direction.axis().index();
    let across_box = if direction.is_lo() {
        my_idx[axis_index] == 0
    } else {
        my_idx[axis_index] == dims[axis_index] - 1
    };
    if across_box && !domain.is_periodic(Axis::from_index(axis_index)) {
        return None;
    }
    let mut idx = *my_idx;
    idx[axis_index] = match (across_box, direction.is_lo()) {
        (false, false) => idx[axis_index] + 1,
        (false, true) => idx[axis_index] - 1,
        (true, false) => 0,
        (true, true) => dims[axis_index] - 1,
    };
    Some(idx)
}
