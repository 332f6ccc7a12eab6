use crate::error::RequestError;
use crate::occupancy::index::GridDims;
use crate::occupancy::types::{Pt3, Vec3, AABB};
use rayon::prelude::*;

/// Smallest and largest cell resolution a request may ask for.
pub const MIN_RESOLUTION: u32 = 8;
pub const MAX_RESOLUTION: u32 = 256;

/// Dense lattice of sample points over a bounding box.
///
/// A grid of cell resolution `R = 2^base` holds `R + 1` points per axis, with
/// the first and last points lying on the box faces. Points are not stored;
/// they are computed from their flat index so a query can materialize one
/// batch at a time.
#[derive(Debug, Clone)]
pub struct DenseGrid {
    /// Cells per axis
    pub resolution: u32,
    /// log2 of `resolution`
    pub resolution_base: u32,
    pub bounds: AABB,
    dims: GridDims,
    /// Distance between neighbouring points on each axis.
    spacing: Vec3,
}

impl DenseGrid {
    /// Creates a grid with `resolution` cells per axis over `bounds`.
    ///
    /// Only powers of two are accepted; range limits are a request concern and
    /// are checked by [`crate::request::OccupancyRequest::validate`].
    pub fn new(resolution: u32, bounds: AABB) -> Result<Self, RequestError> {
        if !resolution.is_power_of_two() {
            return Err(RequestError::ResolutionNotPowerOfTwo(resolution));
        }

        let resolution_base = resolution.trailing_zeros();
        let points_per_axis = (1usize << resolution_base) + 1;
        let spacing = (bounds.max - bounds.min) / (points_per_axis - 1) as f32;

        Ok(Self {
            resolution,
            resolution_base,
            bounds,
            dims: GridDims::cubic(points_per_axis),
            spacing,
        })
    }

    /// Grid over the fixed `±1.05` sampling cube.
    pub fn sampling_cube(resolution: u32) -> Result<Self, RequestError> {
        Self::new(resolution, AABB::sampling_cube())
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn point_count(&self) -> usize {
        self.dims.len()
    }

    /// World position of the sample at integer grid coordinates.
    #[inline]
    pub fn position(&self, x: usize, y: usize, z: usize) -> Pt3 {
        self.bounds.min
            + Vec3::new(
                x as f32 * self.spacing.x,
                y as f32 * self.spacing.y,
                z as f32 * self.spacing.z,
            )
    }

    /// World position of the sample stored at `index` in the flat logit array.
    #[inline]
    pub fn point_at(&self, index: usize) -> Pt3 {
        let (x, y, z) = self.dims.unflatten(index);
        self.position(x, y, z)
    }

    /// All sample points in flat-index order.
    pub fn points(&self) -> Vec<Pt3> {
        (0..self.point_count())
            .into_par_iter()
            .map(|index| self.point_at(index))
            .collect()
    }

    /// Appends the points for `start..end` (flat indices) to `out`, in order.
    pub fn extend_points(&self, start: usize, end: usize, out: &mut Vec<Pt3>) {
        out.par_extend((start..end).into_par_iter().map(|index| self.point_at(index)));
    }
}
