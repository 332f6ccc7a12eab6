//! Flat index <-> grid coordinate mapping.
//!
//! The decoder hands back one logit per sample point as a flat array. Sample
//! `(x, y, z)` sits at `x * (ny * nz) + z * ny + y`: the second axis varies
//! fastest, then the third, then the first. Grid construction, voxel
//! extraction and coloring all go through [`GridDims`] so they agree on it.

use serde::{Deserialize, Serialize};

/// Number of sample points along each axis of a dense grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Same point count on every axis.
    pub fn cubic(n: usize) -> Self {
        Self::new(n, n, n)
    }

    /// Total number of sample points.
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells along the first axis (one less than the point count).
    pub fn cells_per_axis(&self) -> usize {
        self.nx.saturating_sub(1)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Grid coordinate -> position in the flat logit array.
    #[inline]
    pub fn flatten(&self, x: usize, y: usize, z: usize) -> usize {
        x * (self.ny * self.nz) + z * self.ny + y
    }

    /// Position in the flat logit array -> grid coordinate.
    #[inline]
    pub fn unflatten(&self, index: usize) -> (usize, usize, usize) {
        let y = index % self.ny;
        let z = (index / self.ny) % self.nz;
        let x = index / (self.ny * self.nz);
        (x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_second_axis_varies_fastest() {
        let dims = GridDims::cubic(3);

        assert_eq!(dims.unflatten(0), (0, 0, 0));
        assert_eq!(dims.unflatten(1), (0, 1, 0));
        assert_eq!(dims.unflatten(2), (0, 2, 0));
        assert_eq!(dims.unflatten(3), (0, 0, 1));
        assert_eq!(dims.unflatten(9), (1, 0, 0));
        assert_eq!(dims.unflatten(26), (2, 2, 2));
    }

    #[test]
    fn test_non_cubic_dims() {
        let dims = GridDims::new(2, 4, 3);

        // x stride is ny * nz = 12, z stride is ny = 4
        assert_eq!(dims.flatten(1, 0, 0), 12);
        assert_eq!(dims.flatten(0, 0, 1), 4);
        assert_eq!(dims.flatten(1, 3, 2), 12 + 8 + 3);
        assert_eq!(dims.unflatten(23), (1, 3, 2));
        assert_eq!(dims.len(), 24);
    }

    #[test]
    fn test_cells_per_axis() {
        assert_eq!(GridDims::cubic(65).cells_per_axis(), 64);
        assert_eq!(GridDims::cubic(0).cells_per_axis(), 0);
    }

    prop_compose! {
        fn dims_and_index()(nx in 1usize..40, ny in 1usize..40, nz in 1usize..40)
            (index in 0..nx * ny * nz, nx in Just(nx), ny in Just(ny), nz in Just(nz))
            -> (GridDims, usize) {
            (GridDims::new(nx, ny, nz), index)
        }
    }

    proptest! {
        #[test]
        fn should_round_trip_every_flat_index((dims, index) in dims_and_index()) {
            let (x, y, z) = dims.unflatten(index);
            prop_assert!(x < dims.nx && y < dims.ny && z < dims.nz);
            prop_assert_eq!(dims.flatten(x, y, z), index);
        }
    }
}
