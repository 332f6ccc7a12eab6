pub mod color;
pub mod decoder;
pub mod extract;
pub mod grid;
pub mod index;
pub mod pipeline;
pub mod procedural;
pub mod query;
pub mod result;
pub mod sdf;
pub mod stats;
pub mod types;

// Re-export commonly used items
pub use color::{colorize, colorize_named, decode_r2g3b2, encode_r2g3b2, ColorMode};
pub use decoder::{LatentCode, LatentGenerator, SamplingParams, ShapeDecoder, ShapeModel};
pub use extract::{extract_voxels, rethreshold, Extraction};
pub use grid::{DenseGrid, MAX_RESOLUTION, MIN_RESOLUTION};
pub use index::GridDims;
pub use pipeline::{generate_occupancy_field, sample_occupancy, OccupancyField, SamplingOptions};
pub use procedural::{ProceduralLatents, SdfDecoder};
pub use query::{query_occupancy, PointSource, DEFAULT_BATCH_SIZE};
pub use result::{GenerationMetadata, OccupancyResult};
pub use stats::LogitStatistics;
pub use types::{Pt3, Rgb, Vec3, VoxelCoord, AABB};
