use crate::error::ResultError;
use crate::occupancy::index::GridDims;
use crate::occupancy::result::OccupancyResult;
use crate::occupancy::types::VoxelCoord;
use rayon::prelude::*;

/// Occupied cells of a thresholded logit field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Cell coordinates in ascending flat-index order.
    pub voxels: Vec<VoxelCoord>,
    /// Flat logit index of each voxel, parallel to `voxels`.
    pub indices: Vec<usize>,
    /// Cells per axis (sample points per axis minus one).
    pub resolution: u32,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }
}

/// Selects every sample whose logit is strictly greater than `threshold` and
/// converts its flat index back to a cell coordinate.
///
/// Output order is ascending flat index, which is not lexicographic `(x, y, z)`
/// order; colors are computed against the same order. Samples on the last
/// point layer of an axis sit on the box face and have no cell of their own,
/// so they are never reported and every coordinate stays below `resolution`.
pub fn extract_voxels(logits: &[f32], dims: GridDims, threshold: f32) -> Extraction {
    debug_assert_eq!(logits.len(), dims.len(), "logit field does not match grid");

    let upper = [
        dims.nx.saturating_sub(1),
        dims.ny.saturating_sub(1),
        dims.nz.saturating_sub(1),
    ];

    let (indices, voxels): (Vec<usize>, Vec<VoxelCoord>) = logits
        .par_iter()
        .enumerate()
        .filter(|(_, &logit)| logit > threshold)
        .filter_map(|(index, _)| {
            let (x, y, z) = dims.unflatten(index);
            if x >= upper[0] || y >= upper[1] || z >= upper[2] {
                return None;
            }
            Some((index, [x as u32, y as u32, z as u32]))
        })
        .unzip();

    Extraction {
        voxels,
        indices,
        resolution: dims.cells_per_axis() as u32,
    }
}

/// Re-thresholds the raw logits carried by `result` without querying the
/// decoder again.
pub fn rethreshold(result: &OccupancyResult, threshold: f32) -> Result<Extraction, ResultError> {
    let logits = result.logits.as_ref().ok_or(ResultError::MissingLogits)?;

    let dims = result.point_dims();
    if logits.len() != dims.len() {
        return Err(ResultError::LogitCountMismatch {
            expected: dims.len(),
            actual: logits.len(),
        });
    }

    Ok(extract_voxels(logits, dims, threshold))
}
