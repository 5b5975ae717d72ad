use crate::{region::Rect, utils};

/// Uniform grid of bins over a Cartesian region, with the atoms of each bin
/// stored contiguously. Atoms outside the region are placed in the nearest
/// edge bin.
#[derive(Clone, Debug)]
pub struct Bins {
    lo: [f64; 3],
    bin_size: [f64; 3],
    num_bins: [usize; 3],
    /// `atoms[bin_starts[b]..bin_starts[b + 1]]` are the atoms in bin `b`
    bin_starts: Vec<usize>,
    atoms: Vec<usize>,
}

impl Bins {
    /// Bin `positions` over `region` with bins at least `min_bin_size` wide
    pub fn new(region: &Rect, min_bin_size: f64, positions: &[[f64; 3]]) -> Self {
        assert!(min_bin_size > 0.0, "Bin size must be positive");
        let lengths = region.lengths();
        let mut num_bins = [1; 3];
        let mut bin_size = [min_bin_size; 3];
        for d in 0..3 {
            num_bins[d] = ((lengths[d] / min_bin_size).floor() as usize).max(1);
            bin_size[d] = (lengths[d] / num_bins[d] as f64).max(min_bin_size);
        }
        let mut bins = Self {
            lo: region.lo(),
            bin_size,
            num_bins,
            bin_starts: Vec::new(),
            atoms: Vec::new(),
        };
        bins.fill(positions);
        bins
    }

    fn fill(&mut self, positions: &[[f64; 3]]) {
        let keys: Vec<usize> = positions.iter().map(|x| self.coord_to_bin_idx(x)).collect();
        self.atoms = utils::counting_sort_order(&keys);
        let total = self.total_num_bins();
        let mut counts = vec![0; total + 1];
        for &k in &keys {
            counts[k + 1] += 1;
        }
        for b in 0..total {
            counts[b + 1] += counts[b];
        }
        self.bin_starts = counts;
    }

    pub fn lo(&self) -> [f64; 3] {
        self.lo
    }
    pub fn bin_size(&self) -> [f64; 3] {
        self.bin_size
    }
    pub fn num_bins(&self) -> [usize; 3] {
        self.num_bins
    }
    pub fn total_num_bins(&self) -> usize {
        self.num_bins[0] * self.num_bins[1] * self.num_bins[2]
    }

    pub fn coord_to_bin_3d(&self, coord: &[f64; 3]) -> [usize; 3] {
        let mut inds = [0; 3];
        for d in 0..3 {
            let b = ((coord[d] - self.lo[d]) / self.bin_size[d]).floor();
            inds[d] = if b <= 0.0 {
                0
            } else {
                (b as usize).min(self.num_bins[d] - 1)
            };
        }
        inds
    }
    pub fn coord_to_bin_idx(&self, coord: &[f64; 3]) -> usize {
        self.bin_idx_from_3d(&self.coord_to_bin_3d(coord))
    }
    pub fn bin_idx_from_3d(&self, inds: &[usize; 3]) -> usize {
        utils::Index::from_3d(inds, &self.num_bins).idx()
    }

    pub fn atoms_in(&self, bin: usize) -> &[usize] {
        &self.atoms[self.bin_starts[bin]..self.bin_starts[bin + 1]]
    }
    /// Bin `offset` away from `inds`, or `None` past the edge of the grid
    pub fn offset_bin(&self, inds: &[usize; 3], offset: &[i32; 3]) -> Option<usize> {
        let mut out = [0; 3];
        for d in 0..3 {
            let b = inds[d] as i64 + offset[d] as i64;
            if b < 0 || b >= self.num_bins[d] as i64 {
                return None;
            }
            out[d] = b as usize;
        }
        Some(self.bin_idx_from_3d(&out))
    }
}

/// Bin offsets that can hold atoms within `cutoff` of some point in the
/// central bin
#[derive(Clone, Debug, PartialEq)]
pub struct Stencil {
    bin_size: [f64; 3],
    cutoff: f64,
    offsets: Vec<[i32; 3]>,
}
impl Stencil {
    pub fn new(bin_size: [f64; 3], cutoff: f64) -> Self {
        let reach: Vec<i32> = bin_size
            .iter()
            .map(|b| ((cutoff / b).ceil() as i32).max(1))
            .collect();
        // Closest approach between the central bin and one `o` bins away
        let gap = |o: i32, size: f64| ((o.abs() - 1).max(0) as f64) * size;
        let mut offsets = Vec::new();
        for i in -reach[0]..=reach[0] {
            for j in -reach[1]..=reach[1] {
                for k in -reach[2]..=reach[2] {
                    let dx = gap(i, bin_size[0]);
                    let dy = gap(j, bin_size[1]);
                    let dz = gap(k, bin_size[2]);
                    if dx * dx + dy * dy + dz * dz < cutoff * cutoff {
                        offsets.push([i, j, k]);
                    }
                }
            }
        }
        Self {
            bin_size,
            cutoff,
            offsets,
        }
    }
    /// Whether this stencil was built for the given geometry
    pub fn matches(&self, bin_size: [f64; 3], cutoff: f64) -> bool {
        self.bin_size == bin_size && self.cutoff == cutoff
    }
    pub fn offsets(&self) -> &[[i32; 3]] {
        &self.offsets
    }
}
