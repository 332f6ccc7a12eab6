use crate::error::GenerationError;
use crate::occupancy::color::colorize_named;
use crate::occupancy::decoder::{LatentCode, ShapeDecoder, ShapeModel};
use crate::occupancy::extract::{extract_voxels, Extraction};
use crate::occupancy::grid::DenseGrid;
use crate::occupancy::query::{query_occupancy, DEFAULT_BATCH_SIZE};
use crate::occupancy::result::{GenerationMetadata, OccupancyResult};
use crate::occupancy::types::{Rgb, AABB, DEFAULT_BASE_COLOR};
use crate::request::OccupancyRequest;
use std::time::Instant;

/// Everything the sampling stages need once a latent exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    /// Cells per axis, a power of two
    pub resolution: u32,
    pub threshold: f32,
    pub include_logits: bool,
    pub color_mode: Option<String>,
    pub base_color: Rgb,
    pub batch_size: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            resolution: 64,
            threshold: 0.0,
            include_logits: false,
            color_mode: None,
            base_color: DEFAULT_BASE_COLOR,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SamplingOptions {
    pub fn from_request(request: &OccupancyRequest, batch_size: usize) -> Self {
        Self {
            resolution: request.grid_resolution,
            threshold: request.threshold,
            include_logits: request.include_logits,
            color_mode: request.color_mode.clone(),
            base_color: request.base_color_or_default(),
            batch_size,
        }
    }
}

/// Output of the sampling stages before it is packaged as a result.
#[derive(Debug, Clone)]
pub struct OccupancyField {
    pub bounds: AABB,
    pub extraction: Extraction,
    pub colors: Option<Vec<Rgb>>,
    pub logits: Vec<f32>,
}

impl OccupancyField {
    pub fn into_result(self, include_logits: bool, metadata: GenerationMetadata) -> OccupancyResult {
        let logits = include_logits.then_some(self.logits);
        OccupancyResult::assemble(&self.bounds, self.extraction, self.colors, logits, metadata)
    }
}

/// Builds the grid for `options.resolution`, queries `decoder` over it in
/// batches, thresholds the logits and colors the occupied voxels.
///
/// Deterministic for a deterministic decoder: the same latent and options
/// always give the same field.
pub fn sample_occupancy<D>(
    decoder: &D,
    latent: &LatentCode,
    options: &SamplingOptions,
) -> Result<OccupancyField, GenerationError>
where
    D: ShapeDecoder + ?Sized,
{
    let grid = DenseGrid::sampling_cube(options.resolution)?;
    let dims = grid.dims();

    log::info!(
        "Querying occupancy at {} points ({}x{}x{}) in batches of {}",
        grid.point_count(),
        dims.nx,
        dims.ny,
        dims.nz,
        options.batch_size
    );

    let logits = query_occupancy(decoder, &grid, latent, options.batch_size)?;

    let (min_logit, max_logit) = logits
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &l| (lo.min(l), hi.max(l)));
    log::info!("Logit range: [{:.3}, {:.3}]", min_logit, max_logit);

    let extraction = extract_voxels(&logits, dims, options.threshold);

    let total_cells = (extraction.resolution as usize).pow(3);
    log::info!(
        "Occupied voxels: {} / {} ({:.2}%)",
        extraction.len(),
        total_cells,
        100.0 * extraction.len() as f64 / total_cells.max(1) as f64
    );

    let colors = options.color_mode.as_deref().map(|mode| {
        colorize_named(
            &extraction.voxels,
            &logits,
            &extraction.indices,
            dims,
            mode,
            options.base_color,
        )
    });

    Ok(OccupancyField {
        bounds: grid.bounds,
        extraction,
        colors,
        logits,
    })
}

/// Runs the whole pipeline for one request: latent generation, sampling and
/// assembly.
///
/// The request is expected to be validated already; a resolution that is not
/// a power of two is still rejected when the grid is built.
pub fn generate_occupancy_field(
    model: &ShapeModel,
    request: &OccupancyRequest,
    batch_size: usize,
) -> Result<OccupancyResult, GenerationError> {
    let start = Instant::now();

    log::info!(
        "Generating latent code for prompt ({} chars)",
        request.prompt.chars().count()
    );
    let latent = model
        .latents()
        .generate(&request.prompt, &request.sampling())?;
    log::info!("Latent code ready ({} values)", latent.len());

    let options = SamplingOptions::from_request(request, batch_size);
    let field = sample_occupancy(model.decoder(), &latent, &options)?;

    let metadata = GenerationMetadata {
        generation_time_secs: start.elapsed().as_secs_f64(),
        seed_used: request.seed,
        model_version: model.version().to_string(),
    };

    log::info!(
        "Generation finished in {:.2}s",
        metadata.generation_time_secs
    );

    Ok(field.into_result(options.include_logits, metadata))
}
