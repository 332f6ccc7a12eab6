use nalgebra::{Point3, Vector3};

pub type Pt3 = Point3<f32>;
pub type Vec3 = Vector3<f32>;

/// Integer cell coordinate of an occupied voxel.
pub type VoxelCoord = [u32; 3];

/// Linear RGB color, each channel in [0, 1].
pub type Rgb = [f32; 3];

/// Light gray used when a request picks a color mode without a base color.
pub const DEFAULT_BASE_COLOR: Rgb = [0.8, 0.8, 0.8];

/// Half extent of the sampling cube used by the shape model (slightly larger
/// than the unit cube the shapes are normalized into).
pub const BBOX_HALF_EXTENT: f32 = 1.05;

/// Axis-aligned bounding box in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Pt3,
    pub max: Pt3,
}

impl AABB {
    pub fn new(min: Pt3, max: Pt3) -> Self {
        Self { min, max }
    }

    /// The fixed `[-1.05, 1.05]³` box every occupancy query samples.
    pub fn sampling_cube() -> Self {
        Self {
            min: Pt3::new(-BBOX_HALF_EXTENT, -BBOX_HALF_EXTENT, -BBOX_HALF_EXTENT),
            max: Pt3::new(BBOX_HALF_EXTENT, BBOX_HALF_EXTENT, BBOX_HALF_EXTENT),
        }
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn min_array(&self) -> [f32; 3] {
        [self.min.x, self.min.y, self.min.z]
    }

    pub fn max_array(&self) -> [f32; 3] {
        [self.max.x, self.max.y, self.max.z]
    }
}
