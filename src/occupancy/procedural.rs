// Deterministic analytic shape backend.
// Prompts hash into a handful of sphere and capsule primitives; the decoder
// evaluates their smooth union as a signed distance field.

use crate::error::DecoderError;
use crate::occupancy::decoder::{LatentCode, LatentGenerator, SamplingParams, ShapeDecoder, ShapeModel};
use crate::occupancy::sdf::{capsule_sdf, smooth_min_poly, sphere_sdf};
use crate::occupancy::types::{Pt3, Vec3};
use crate::settings::ProceduralSettings;
use rayon::prelude::*;
use std::sync::Arc;

/// Floats per packed primitive: kind, a.xyz, b.xyz, radius.
const BLOB_STRIDE: usize = 8;

const KIND_SPHERE: f32 = 0.0;
const KIND_CAPSULE: f32 = 1.0;

/// Distance reported for an empty primitive set (everything outside).
const EMPTY_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Primitive {
    Sphere { center: Pt3, radius: f32 },
    Capsule { a: Pt3, b: Pt3, radius: f32 },
}

impl Primitive {
    fn distance(&self, point: &Pt3) -> f32 {
        match self {
            Primitive::Sphere { center, radius } => sphere_sdf(point, center, *radius),
            Primitive::Capsule { a, b, radius } => capsule_sdf(point, a, b, *radius),
        }
    }

    fn pack(&self, out: &mut Vec<f32>) {
        match *self {
            Primitive::Sphere { center, radius } => {
                out.extend_from_slice(&[KIND_SPHERE, center.x, center.y, center.z]);
                out.extend_from_slice(&[center.x, center.y, center.z, radius]);
            }
            Primitive::Capsule { a, b, radius } => {
                out.extend_from_slice(&[KIND_CAPSULE, a.x, a.y, a.z]);
                out.extend_from_slice(&[b.x, b.y, b.z, radius]);
            }
        }
    }

    fn unpack(values: &[f32]) -> Result<Self, DecoderError> {
        let a = Pt3::new(values[1], values[2], values[3]);
        let b = Pt3::new(values[4], values[5], values[6]);
        let radius = values[7];

        if !values.iter().all(|v| v.is_finite()) || radius <= 0.0 {
            return Err(DecoderError::InvalidLatent(format!(
                "primitive has non-finite values or non-positive radius: {:?}",
                values
            )));
        }

        if values[0] == KIND_SPHERE {
            Ok(Primitive::Sphere { center: a, radius })
        } else if values[0] == KIND_CAPSULE {
            Ok(Primitive::Capsule { a, b, radius })
        } else {
            Err(DecoderError::InvalidLatent(format!(
                "unknown primitive kind {}",
                values[0]
            )))
        }
    }
}

fn pack_primitives(primitives: &[Primitive]) -> LatentCode {
    let mut values = Vec::with_capacity(1 + primitives.len() * BLOB_STRIDE);
    values.push(primitives.len() as f32);
    for primitive in primitives {
        primitive.pack(&mut values);
    }
    LatentCode::new(values)
}

fn unpack_primitives(latent: &LatentCode) -> Result<Vec<Primitive>, DecoderError> {
    let values = latent.as_slice();
    let (&count, body) = values
        .split_first()
        .ok_or_else(|| DecoderError::InvalidLatent("latent code is empty".to_string()))?;

    let mismatch = || {
        DecoderError::InvalidLatent(format!(
            "header announces {} primitives but {} values follow",
            count,
            body.len()
        ))
    };

    if !count.is_finite() || count < 0.0 || count.fract() != 0.0 || count > body.len() as f32 {
        return Err(mismatch());
    }

    let expected = (count as usize)
        .checked_mul(BLOB_STRIDE)
        .ok_or_else(mismatch)?;
    if body.len() != expected {
        return Err(mismatch());
    }

    body.chunks_exact(BLOB_STRIDE).map(Primitive::unpack).collect()
}

/// FNV-1a over the prompt bytes.
fn prompt_hash(prompt: &str) -> u64 {
    prompt.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Stateless integer hash of a stream key and a draw index.
fn mix(key: u32, blob: u32, draw: u32) -> u32 {
    let mut state = key
        .wrapping_mul(0x9E3779B9)
        .wrapping_add(blob.wrapping_mul(0x517CC1B7))
        .wrapping_add(draw.wrapping_mul(0x6C62272E));

    state ^= state >> 16;
    state = state.wrapping_mul(0x45D9F3B);
    state ^= state >> 16;
    state = state.wrapping_mul(0x45D9F3B);
    state ^= state >> 16;

    state
}

/// Float in [lo, hi) drawn from `mix`.
fn draw(key: u32, blob: u32, draw_index: u32, lo: f32, hi: f32) -> f32 {
    let unit = (mix(key, blob, draw_index) >> 8) as f32 / 16_777_216.0;
    lo + (hi - lo) * unit
}

/// Turns a prompt and seed into packed primitives.
///
/// The same prompt and seed always give the same latent. `guidance_scale` and
/// `top_p` have no analytic meaning here and are ignored.
#[derive(Debug, Clone)]
pub struct ProceduralLatents {
    pub blob_count: usize,
}

impl ProceduralLatents {
    pub fn new(blob_count: usize) -> Self {
        Self { blob_count }
    }

    fn stream_key(prompt: &str, seed: Option<i64>) -> u32 {
        let hash = prompt_hash(prompt) ^ (seed.unwrap_or(0) as u64).rotate_left(32);
        (hash as u32) ^ ((hash >> 32) as u32)
    }
}

impl LatentGenerator for ProceduralLatents {
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingParams,
    ) -> Result<LatentCode, DecoderError> {
        let key = Self::stream_key(prompt, sampling.seed);

        // Per-axis scale so the longest requested axis spans the unit cube
        let scale = match sampling.bounding_box_xyz {
            Some([x, y, z]) => {
                let longest = x.max(y).max(z);
                Vec3::new(x / longest, y / longest, z / longest)
            }
            None => Vec3::new(1.0, 1.0, 1.0),
        };
        let place = |p: Pt3| Pt3::new(p.x * scale.x, p.y * scale.y, p.z * scale.z);
        let radius_scale = scale.x.min(scale.y).min(scale.z);

        let mut primitives = Vec::with_capacity(self.blob_count);
        for i in 0..self.blob_count as u32 {
            let radius = draw(key, i, 0, 0.15, 0.4) * radius_scale;

            // The first primitive anchors the shape at the center
            if i == 0 {
                primitives.push(Primitive::Sphere {
                    center: Pt3::origin(),
                    radius: radius + 0.1 * radius_scale,
                });
                continue;
            }

            let a = Pt3::new(
                draw(key, i, 1, -0.6, 0.6),
                draw(key, i, 2, -0.6, 0.6),
                draw(key, i, 3, -0.6, 0.6),
            );

            if draw(key, i, 4, 0.0, 1.0) < 0.5 {
                primitives.push(Primitive::Sphere {
                    center: place(a),
                    radius,
                });
            } else {
                let b = a + Vec3::new(
                    draw(key, i, 5, -0.4, 0.4),
                    draw(key, i, 6, -0.4, 0.4),
                    draw(key, i, 7, -0.4, 0.4),
                );
                primitives.push(Primitive::Capsule {
                    a: place(a),
                    b: place(b),
                    radius: radius * 0.6,
                });
            }
        }

        log::debug!(
            "Procedural latent for key {:08x}: {} primitives",
            key,
            primitives.len()
        );

        Ok(pack_primitives(&primitives))
    }
}

/// Evaluates the smooth union of the packed primitives and reports
/// `-distance * sharpness` as the logit, so points inside are positive.
#[derive(Debug, Clone)]
pub struct SdfDecoder {
    pub sharpness: f32,
    pub blend: f32,
}

impl SdfDecoder {
    pub fn new(sharpness: f32, blend: f32) -> Self {
        Self { sharpness, blend }
    }
}

impl ShapeDecoder for SdfDecoder {
    fn query(&self, points: &[Pt3], latent: &LatentCode) -> Result<Vec<f32>, DecoderError> {
        let primitives = unpack_primitives(latent)?;

        let logits = points
            .par_iter()
            .map(|point| {
                let distance = primitives
                    .iter()
                    .map(|primitive| primitive.distance(point))
                    .reduce(|a, b| smooth_min_poly(a, b, self.blend))
                    .unwrap_or(EMPTY_DISTANCE);
                -distance * self.sharpness
            })
            .collect();

        Ok(logits)
    }
}

impl ShapeModel {
    /// Model backed by [`ProceduralLatents`] and [`SdfDecoder`].
    pub fn procedural(version: impl Into<String>, settings: &ProceduralSettings) -> Self {
        ShapeModel::new(
            version,
            Arc::new(ProceduralLatents::new(settings.blob_count)),
            Arc::new(SdfDecoder::new(settings.sharpness, settings.blend_radius)),
        )
    }
}
