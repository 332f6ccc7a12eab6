use crate::error::RequestError;
use crate::occupancy::decoder::SamplingParams;
use crate::occupancy::grid::{MAX_RESOLUTION, MIN_RESOLUTION};
use crate::occupancy::types::{Rgb, DEFAULT_BASE_COLOR};
use serde::{Deserialize, Serialize};

/// Longest prompt accepted by default.
pub const MAX_PROMPT_LEN: usize = 10_000;

pub const DEFAULT_RESOLUTION: u32 = 64;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 3.0;
const MAX_GUIDANCE_SCALE: f32 = 20.0;

fn default_resolution() -> u32 {
    DEFAULT_RESOLUTION
}

fn default_guidance_scale() -> f32 {
    DEFAULT_GUIDANCE_SCALE
}

/// Request for occupancy field generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRequest {
    /// Text prompt describing the 3D object
    pub prompt: String,

    /// Random seed for reproducibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Cells per axis; must be a power of 2 in 8..=256
    #[serde(default = "default_resolution")]
    pub grid_resolution: u32,

    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,

    /// Nucleus sampling cutoff (None = deterministic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Target proportions of the generated shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box_xyz: Option<[f32; 3]>,

    /// Logit threshold; a sample is occupied when its logit is strictly greater
    #[serde(default)]
    pub threshold: f32,

    /// Return the raw logits with the result
    #[serde(default)]
    pub include_logits: bool,

    /// One of "solid", "height", "radial", "density"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<String>,

    /// Base RGB color, each channel in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color: Option<Rgb>,
}

impl OccupancyRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: None,
            grid_resolution: DEFAULT_RESOLUTION,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            top_p: None,
            bounding_box_xyz: None,
            threshold: 0.0,
            include_logits: false,
            color_mode: None,
            base_color: None,
        }
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the resolution, clamped into the supported range. A value that is
    /// not a power of two is kept and rejected later by [`Self::validate`].
    pub fn with_grid_resolution(mut self, resolution: u32) -> Self {
        self.grid_resolution = resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION);
        self
    }

    pub fn with_guidance_scale(mut self, scale: f32) -> Self {
        self.guidance_scale = scale.clamp(0.0, MAX_GUIDANCE_SCALE);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_bounding_box(mut self, x: f32, y: f32, z: f32) -> Self {
        self.bounding_box_xyz = Some([x, y, z]);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_logits(mut self, include: bool) -> Self {
        self.include_logits = include;
        self
    }

    pub fn with_color_mode(mut self, mode: impl Into<String>) -> Self {
        self.color_mode = Some(mode.into());
        self
    }

    pub fn with_base_color(mut self, color: Rgb) -> Self {
        self.base_color = Some(color);
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        self.validate_with_prompt_limit(MAX_PROMPT_LEN)
    }

    /// Checks every precondition of the pipeline, with a caller-chosen prompt
    /// length limit (in characters).
    pub fn validate_with_prompt_limit(&self, max_prompt_len: usize) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::InvalidPrompt(
                "Prompt cannot be empty".to_string(),
            ));
        }

        let prompt_len = self.prompt.chars().count();
        if prompt_len > max_prompt_len {
            return Err(RequestError::InvalidPrompt(format!(
                "Prompt too long ({} chars, max {})",
                prompt_len, max_prompt_len
            )));
        }

        if !self.grid_resolution.is_power_of_two() {
            return Err(RequestError::ResolutionNotPowerOfTwo(self.grid_resolution));
        }

        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.grid_resolution) {
            return Err(RequestError::ResolutionOutOfRange {
                value: self.grid_resolution,
                min: MIN_RESOLUTION,
                max: MAX_RESOLUTION,
            });
        }

        if !self.threshold.is_finite() {
            return Err(RequestError::ThresholdNotFinite(self.threshold));
        }

        if !(0.0..=MAX_GUIDANCE_SCALE).contains(&self.guidance_scale) {
            return Err(RequestError::GuidanceOutOfRange(self.guidance_scale));
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(RequestError::TopPOutOfRange(top_p));
            }
        }

        if let Some(color) = self.base_color {
            if !color.iter().all(|c| (0.0..=1.0).contains(c)) {
                return Err(RequestError::BaseColorOutOfRange(color));
            }
        }

        if let Some(bbox) = self.bounding_box_xyz {
            if !bbox.iter().all(|v| v.is_finite() && *v > 0.0) {
                return Err(RequestError::InvalidBoundingBox(bbox));
            }
        }

        Ok(())
    }

    /// Latent sampling controls carried by this request.
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            seed: self.seed,
            guidance_scale: self.guidance_scale,
            top_p: self.top_p,
            bounding_box_xyz: self.bounding_box_xyz,
        }
    }

    pub fn base_color_or_default(&self) -> Rgb {
        self.base_color.unwrap_or(DEFAULT_BASE_COLOR)
    }
}

/// Shortens a prompt for log and console output, appending "..." when cut.
pub fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt.to_string();
    }
    let head: String = prompt.chars().take(max_chars).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let request: OccupancyRequest = serde_json::from_str(r#"{"prompt": "a chair"}"#).unwrap();

        assert_eq!(request, OccupancyRequest::new("a chair"));
        assert_eq!(request.grid_resolution, 64);
        assert_eq!(request.guidance_scale, 3.0);
        assert_eq!(request.threshold, 0.0);
        assert!(!request.include_logits);
        assert_eq!(request.base_color_or_default(), [0.8, 0.8, 0.8]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let request = OccupancyRequest::new("a lamp")
            .with_seed(42)
            .with_grid_resolution(1024)
            .with_guidance_scale(-1.0)
            .with_top_p(1.5)
            .with_bounding_box(1.0, 2.0, 1.0)
            .with_threshold(0.5)
            .with_logits(true)
            .with_color_mode("height")
            .with_base_color([1.0, 0.0, 0.0]);

        assert_eq!(request.seed, Some(42));
        assert_eq!(request.grid_resolution, 256);
        assert_eq!(request.guidance_scale, 0.0);
        assert_eq!(request.top_p, Some(1.0));
        assert!(request.validate().is_ok());

        let sampling = request.sampling();
        assert_eq!(sampling.seed, Some(42));
        assert_eq!(sampling.bounding_box_xyz, Some([1.0, 2.0, 1.0]));
    }

    #[test]
    fn test_resolution_validation() {
        for resolution in [8, 16, 32, 64, 128, 256] {
            let mut request = OccupancyRequest::new("x");
            request.grid_resolution = resolution;
            assert!(request.validate().is_ok(), "{} should be valid", resolution);
        }

        let mut request = OccupancyRequest::new("x");
        request.grid_resolution = 50;
        assert_eq!(
            request.validate(),
            Err(RequestError::ResolutionNotPowerOfTwo(50))
        );

        request.grid_resolution = 0;
        assert_eq!(
            request.validate(),
            Err(RequestError::ResolutionNotPowerOfTwo(0))
        );

        request.grid_resolution = 512;
        assert!(matches!(
            request.validate(),
            Err(RequestError::ResolutionOutOfRange { value: 512, .. })
        ));

        request.grid_resolution = 4;
        assert!(matches!(
            request.validate(),
            Err(RequestError::ResolutionOutOfRange { value: 4, .. })
        ));
    }

    #[test]
    fn test_prompt_validation() {
        assert!(matches!(
            OccupancyRequest::new("   ").validate(),
            Err(RequestError::InvalidPrompt(_))
        ));

        let long = OccupancyRequest::new("a".repeat(MAX_PROMPT_LEN + 1));
        assert!(long.validate().is_err());
        assert!(long.validate_with_prompt_limit(MAX_PROMPT_LEN + 1).is_ok());

        let short_limit = OccupancyRequest::new("a sofa");
        assert!(short_limit.validate_with_prompt_limit(3).is_err());
    }

    #[test]
    fn test_numeric_validation() {
        let base = OccupancyRequest::new("x");

        let mut request = base.clone();
        request.threshold = f32::NAN;
        assert!(matches!(
            request.validate(),
            Err(RequestError::ThresholdNotFinite(_))
        ));

        let mut request = base.clone();
        request.guidance_scale = 25.0;
        assert_eq!(request.validate(), Err(RequestError::GuidanceOutOfRange(25.0)));

        let mut request = base.clone();
        request.top_p = Some(-0.1);
        assert_eq!(request.validate(), Err(RequestError::TopPOutOfRange(-0.1)));

        let request = base.clone().with_base_color([1.2, 0.0, 0.0]);
        assert!(matches!(
            request.validate(),
            Err(RequestError::BaseColorOutOfRange(_))
        ));

        let request = base.with_bounding_box(1.0, 0.0, 1.0);
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidBoundingBox(_))
        ));
    }

    #[test]
    fn test_truncate_prompt() {
        assert_eq!(truncate_prompt("a chair", 60), "a chair");
        assert_eq!(truncate_prompt("abcdef", 3), "abc...");
        // Cuts on characters, not bytes
        assert_eq!(truncate_prompt("théière", 3), "thé...");
    }
}
