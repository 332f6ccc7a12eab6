use std::time::Duration;
use thiserror::Error;

/// A request rejected before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("grid_resolution must be a power of 2, got {0}")]
    ResolutionNotPowerOfTwo(u32),

    #[error("grid_resolution {value} outside supported range {min}..={max}")]
    ResolutionOutOfRange { value: u32, min: u32, max: u32 },

    #[error("threshold must be a finite number, got {0}")]
    ThresholdNotFinite(f32),

    #[error("guidance_scale {0} outside 0.0..=20.0")]
    GuidanceOutOfRange(f32),

    #[error("top_p {0} outside 0.0..=1.0")]
    TopPOutOfRange(f32),

    #[error("base_color channels must be in 0.0..=1.0, got {0:?}")]
    BaseColorOutOfRange([f32; 3]),

    #[error("bounding_box_xyz entries must be positive and finite, got {0:?}")]
    InvalidBoundingBox([f32; 3]),
}

/// Failure reported by a shape decoder or latent generator collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecoderError {
    #[error("decoder backend error: {0}")]
    Backend(String),

    #[error("decoder returned {actual} logits for a batch of {expected} points (batch offset {offset})")]
    LogitCountMismatch {
        expected: usize,
        actual: usize,
        offset: usize,
    },

    #[error("malformed latent code: {0}")]
    InvalidLatent(String),
}

/// Problems found in an assembled (or received) occupancy result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultError {
    #[error("Resolution cannot be zero")]
    ZeroResolution,

    #[error("Voxel {index} has {axis} coordinate {coord} >= resolution {resolution}")]
    VoxelOutOfBounds {
        index: usize,
        axis: &'static str,
        coord: u32,
        resolution: u32,
    },

    #[error("Color count ({colors}) doesn't match voxel count ({voxels})")]
    ColorCountMismatch { colors: usize, voxels: usize },

    #[error("Logits length {actual} doesn't match expected {expected} ((resolution + 1)^3)")]
    LogitCountMismatch { expected: usize, actual: usize },

    #[error("Result does not contain raw logits")]
    MissingLogits,
}

/// Coarse classification a serving layer maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientInput,
    ServiceUnavailable,
    GenerationFailure,
}

/// Top-level error of an occupancy generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("{0}")]
    ModelUnavailable(String),

    #[error("Generation failed: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Generation did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Generation worker failed: {0}")]
    Worker(String),
}

impl GenerationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::InvalidRequest(_) => ErrorClass::ClientInput,
            GenerationError::ModelUnavailable(_) => ErrorClass::ServiceUnavailable,
            GenerationError::Decoder(_)
            | GenerationError::Timeout(_)
            | GenerationError::Worker(_) => ErrorClass::GenerationFailure,
        }
    }

    /// HTTP status a web front end would answer with.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::ClientInput => 400,
            ErrorClass::ServiceUnavailable => 503,
            ErrorClass::GenerationFailure => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let bad_input = GenerationError::from(RequestError::ResolutionNotPowerOfTwo(50));
        assert_eq!(bad_input.class(), ErrorClass::ClientInput);
        assert_eq!(bad_input.status_code(), 400);

        let unavailable = GenerationError::ModelUnavailable("still loading".to_string());
        assert_eq!(unavailable.status_code(), 503);

        let failed = GenerationError::from(DecoderError::Backend("out of memory".to_string()));
        assert_eq!(failed.class(), ErrorClass::GenerationFailure);
        assert_eq!(failed.status_code(), 500);
        assert_eq!(
            failed.to_string(),
            "Generation failed: decoder backend error: out of memory"
        );
    }
}
