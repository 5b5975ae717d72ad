/// Linear index into an `nx * ny * nz` array, stored x-major
/// (`x * ny * nz + y * nz + z`), matching the processor grid and bin layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Index {
    idx: usize,
    bounds: [usize; 3],
}
impl Index {
    pub fn from_3d(indices: &[usize; 3], bounds: &[usize; 3]) -> Self {
        let [x, y, z] = *indices;
        let [nx, ny, nz] = *bounds;
        assert!(
            x < nx && y < ny && z < nz,
            "Multidimensional index {:?} out of bounds {:?}",
            indices,
            bounds
        );
        Self {
            idx: x * ny * nz + y * nz + z,
            bounds: *bounds,
        }
    }
    pub fn from_linear(idx: usize, bounds: &[usize; 3]) -> Self {
        assert!(
            idx < bounds[0] * bounds[1] * bounds[2],
            "Index {} should be smaller than total number {}",
            idx,
            bounds[0] * bounds[1] * bounds[2]
        );
        Self {
            idx,
            bounds: *bounds,
        }
    }
    pub fn to_3d(&self) -> [usize; 3] {
        let z = self.idx % self.bounds[2];
        let q = self.idx / self.bounds[2];
        let y = q % self.bounds[1];
        let x = q / self.bounds[1];
        [x, y, z]
    }
    pub fn idx(&self) -> usize {
        self.idx
    }
    pub fn bounds(&self) -> [usize; 3] {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_and_3d_agree() {
        let bounds = [3, 4, 5];
        for idx in 0..60 {
            let i = Index::from_linear(idx, &bounds);
            assert_eq!(Index::from_3d(&i.to_3d(), &bounds).idx(), idx);
        }
        assert_eq!(Index::from_3d(&[1, 0, 0], &bounds).idx(), 20);
    }
}
