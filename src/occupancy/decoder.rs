// Collaborator contracts for the occupancy pipeline.
// The neural model lives behind these traits; the pipeline only ever sees a
// latent code and a function from points to logits.

use crate::error::DecoderError;
use crate::occupancy::types::Pt3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque shape representation produced by a [`LatentGenerator`] and consumed
/// by a [`ShapeDecoder`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatentCode(Vec<f32>);

impl LatentCode {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Request-scoped sampling controls for latent generation.
///
/// The seed travels with the request instead of reseeding any process-wide
/// generator, so concurrent requests cannot disturb each other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SamplingParams {
    pub seed: Option<i64>,
    pub guidance_scale: f32,
    pub top_p: Option<f32>,
    pub bounding_box_xyz: Option<[f32; 3]>,
}

/// Implicit occupancy decoder: one logit per query point.
///
/// Implementations must return logits in the same order as `points` and accept
/// any batch up to the configured batch size. The pipeline never calls a
/// decoder from two requests at once, but implementations still need to be
/// `Sync` so the model can be shared with worker threads.
pub trait ShapeDecoder: Send + Sync {
    fn query(&self, points: &[Pt3], latent: &LatentCode) -> Result<Vec<f32>, DecoderError>;
}

impl<F> ShapeDecoder for F
where
    F: Fn(&[Pt3], &LatentCode) -> Result<Vec<f32>, DecoderError> + Send + Sync,
{
    fn query(&self, points: &[Pt3], latent: &LatentCode) -> Result<Vec<f32>, DecoderError> {
        self(points, latent)
    }
}

/// Upstream stage turning a prompt into a latent code (text encoder, token
/// generator and codebook decode in a neural backend).
pub trait LatentGenerator: Send + Sync {
    fn generate(&self, prompt: &str, sampling: &SamplingParams)
        -> Result<LatentCode, DecoderError>;
}

/// A loaded model: latent generator, decoder and the version tag reported in
/// result metadata.
#[derive(Clone)]
pub struct ShapeModel {
    version: String,
    latents: Arc<dyn LatentGenerator>,
    decoder: Arc<dyn ShapeDecoder>,
}

impl ShapeModel {
    pub fn new(
        version: impl Into<String>,
        latents: Arc<dyn LatentGenerator>,
        decoder: Arc<dyn ShapeDecoder>,
    ) -> Self {
        Self {
            version: version.into(),
            latents,
            decoder,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn latents(&self) -> &dyn LatentGenerator {
        self.latents.as_ref()
    }

    pub fn decoder(&self) -> &dyn ShapeDecoder {
        self.decoder.as_ref()
    }
}

impl fmt::Debug for ShapeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeModel")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
