use crate::error::ResultError;
use crate::occupancy::color::{encode_r2g3b2, DEFAULT_MATERIAL};
use crate::occupancy::extract::Extraction;
use crate::occupancy::index::GridDims;
use crate::occupancy::stats::LogitStatistics;
use crate::occupancy::types::{Rgb, VoxelCoord, AABB};
use serde::{Deserialize, Serialize};

/// Metadata about the generation process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Wall-clock time of the whole pipeline
    pub generation_time_secs: f64,

    #[serde(default)]
    pub seed_used: Option<i64>,

    pub model_version: String,
}

/// Occupancy field of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyResult {
    /// Cells per axis (N x N x N)
    pub resolution: u32,

    pub bbox_min: [f32; 3],

    pub bbox_max: [f32; 3],

    /// Occupied cells in ascending flat-index order
    pub occupied_voxels: Vec<VoxelCoord>,

    /// One color per occupied voxel, same order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voxel_colors: Option<Vec<Rgb>>,

    /// Raw logits for all `(resolution + 1)^3` sample points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logits: Option<Vec<f32>>,

    pub metadata: GenerationMetadata,
}

impl OccupancyResult {
    /// Packages pipeline output.
    ///
    /// An empty color list is dropped rather than returned, so `voxel_colors`
    /// is only present when there is at least one colored voxel.
    pub fn assemble(
        bounds: &AABB,
        extraction: Extraction,
        colors: Option<Vec<Rgb>>,
        logits: Option<Vec<f32>>,
        metadata: GenerationMetadata,
    ) -> Self {
        debug_assert!(colors
            .as_ref()
            .map_or(true, |c| c.len() == extraction.voxels.len()));

        Self {
            resolution: extraction.resolution,
            bbox_min: bounds.min_array(),
            bbox_max: bounds.max_array(),
            occupied_voxels: extraction.voxels,
            voxel_colors: colors.filter(|c| !c.is_empty()),
            logits,
            metadata,
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied_voxels.len()
    }

    pub fn total_cells(&self) -> usize {
        (self.resolution as usize).pow(3)
    }

    pub fn occupancy_ratio(&self) -> f32 {
        if self.total_cells() == 0 {
            return 0.0;
        }
        self.occupied_count() as f32 / self.total_cells() as f32
    }

    pub fn bbox_dimensions(&self) -> [f32; 3] {
        [
            self.bbox_max[0] - self.bbox_min[0],
            self.bbox_max[1] - self.bbox_min[1],
            self.bbox_max[2] - self.bbox_min[2],
        ]
    }

    /// Sample points per axis of the grid the logits were taken on.
    pub fn point_dims(&self) -> GridDims {
        GridDims::cubic(self.resolution as usize + 1)
    }

    pub fn has_logits(&self) -> bool {
        self.logits.is_some()
    }

    pub fn has_colors(&self) -> bool {
        self.voxel_colors.is_some()
    }

    pub fn logit_statistics(&self) -> Option<LogitStatistics> {
        self.logits
            .as_deref()
            .and_then(LogitStatistics::from_logits)
    }

    /// One palette material per voxel: the R2G3B2 encoding of its color, or
    /// `default` (white when `None`) if the result carries no colors.
    pub fn materials(&self, default: Option<u8>) -> Vec<u8> {
        match &self.voxel_colors {
            Some(colors) => colors.iter().map(|&c| encode_r2g3b2(c)).collect(),
            None => vec![default.unwrap_or(DEFAULT_MATERIAL); self.occupied_count()],
        }
    }

    pub fn validate(&self) -> Result<(), ResultError> {
        if self.resolution == 0 {
            return Err(ResultError::ZeroResolution);
        }

        for (index, voxel) in self.occupied_voxels.iter().enumerate() {
            for (axis, &coord) in voxel.iter().enumerate() {
                if coord >= self.resolution {
                    return Err(ResultError::VoxelOutOfBounds {
                        index,
                        axis: ["x", "y", "z"][axis],
                        coord,
                        resolution: self.resolution,
                    });
                }
            }
        }

        if let Some(colors) = &self.voxel_colors {
            if colors.len() != self.occupied_voxels.len() {
                return Err(ResultError::ColorCountMismatch {
                    colors: colors.len(),
                    voxels: self.occupied_voxels.len(),
                });
            }
        }

        if let Some(logits) = &self.logits {
            let expected = self.point_dims().len();
            if logits.len() != expected {
                return Err(ResultError::LogitCountMismatch {
                    expected,
                    actual: logits.len(),
                });
            }
        }

        Ok(())
    }

    /// Compact binary form for transports that do not want JSON.
    ///
    /// Layout, all little-endian: `resolution`, voxel count and color count as
    /// `u32`, then `bbox_min` and `bbox_max` as `f32`, then the voxel triples
    /// (`u32`) and color triples (`f32`).
    pub fn to_bytes(&self) -> Vec<u8> {
        let colors: &[Rgb] = self.voxel_colors.as_deref().unwrap_or(&[]);
        let payload_len = (self.occupied_voxels.len() + colors.len()) * 12;

        let mut bytes = Vec::with_capacity(12 + 24 + payload_len);
        bytes.extend_from_slice(&self.resolution.to_le_bytes());
        bytes.extend_from_slice(&(self.occupied_voxels.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(colors.len() as u32).to_le_bytes());
        for value in self.bbox_min.iter().chain(self.bbox_max.iter()) {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        extend_le_u32(&mut bytes, bytemuck::cast_slice(&self.occupied_voxels));
        extend_le_f32(&mut bytes, bytemuck::cast_slice(colors));

        bytes
    }
}

#[cfg(target_endian = "little")]
fn extend_le_u32(out: &mut Vec<u8>, values: &[u32]) {
    out.extend_from_slice(bytemuck::cast_slice(values));
}

#[cfg(not(target_endian = "little"))]
fn extend_le_u32(out: &mut Vec<u8>, values: &[u32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(target_endian = "little")]
fn extend_le_f32(out: &mut Vec<u8>, values: &[f32]) {
    out.extend_from_slice(bytemuck::cast_slice(values));
}

#[cfg(not(target_endian = "little"))]
fn extend_le_f32(out: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
