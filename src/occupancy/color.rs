//! Per-voxel color policies.
//!
//! Every policy is a pure function of the occupied set and a base color that
//! acts as a multiplicative anchor. `height` and `radial` normalize over voxel
//! coordinates while `density` normalizes over the occupied logits; that
//! asymmetry is intentional.
//!
//! Colors can also be packed into R2G3B2 palette materials (128-255) for
//! voxel formats that store one byte per cell.

use crate::occupancy::index::GridDims;
use crate::occupancy::types::{Rgb, VoxelCoord};
use std::fmt;
use std::str::FromStr;

/// Material index of white in the R2G3B2 palette
pub const DEFAULT_MATERIAL: u8 = 255;

const DENSITY_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    #[default]
    Solid,
    Height,
    Radial,
    Density,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown color mode '{0}'")]
pub struct UnknownColorMode(pub String);

impl ColorMode {
    pub const ALL: [ColorMode; 4] = [
        ColorMode::Solid,
        ColorMode::Height,
        ColorMode::Radial,
        ColorMode::Density,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Solid => "solid",
            ColorMode::Height => "height",
            ColorMode::Radial => "radial",
            ColorMode::Density => "density",
        }
    }

    /// Parses a mode name, degrading to [`ColorMode::Solid`] for anything
    /// unrecognized.
    pub fn resolve(name: &str) -> ColorMode {
        name.parse().unwrap_or_else(|err: UnknownColorMode| {
            log::warn!("{}, falling back to solid coloring", err);
            ColorMode::Solid
        })
    }
}

impl FromStr for ColorMode {
    type Err = UnknownColorMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solid" => Ok(ColorMode::Solid),
            "height" => Ok(ColorMode::Height),
            "radial" => Ok(ColorMode::Radial),
            "density" => Ok(ColorMode::Density),
            _ => Err(UnknownColorMode(s.to_string())),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes one color per occupied voxel.
///
/// `logits` is the full flat field and `occupied_indices` the flat index of
/// each voxel (same order as `voxels`). Output has the same length and order
/// as `voxels`, with every channel in [0, 1].
pub fn colorize(
    voxels: &[VoxelCoord],
    logits: &[f32],
    occupied_indices: &[usize],
    dims: GridDims,
    mode: ColorMode,
    base_color: Rgb,
) -> Vec<Rgb> {
    if voxels.is_empty() {
        return Vec::new();
    }

    match mode {
        ColorMode::Solid => vec![clamp_unit(base_color); voxels.len()],
        ColorMode::Height => height_colors(voxels, base_color),
        ColorMode::Radial => radial_colors(voxels, dims, base_color),
        ColorMode::Density => density_colors(logits, occupied_indices, base_color),
    }
}

/// [`colorize`] with the mode given by name; unknown names color solid.
pub fn colorize_named(
    voxels: &[VoxelCoord],
    logits: &[f32],
    occupied_indices: &[usize],
    dims: GridDims,
    mode: &str,
    base_color: Rgb,
) -> Vec<Rgb> {
    colorize(
        voxels,
        logits,
        occupied_indices,
        dims,
        ColorMode::resolve(mode),
        base_color,
    )
}

fn height_colors(voxels: &[VoxelCoord], base: Rgb) -> Vec<Rgb> {
    let (min_y, max_y) = voxels
        .iter()
        .fold((u32::MAX, u32::MIN), |(lo, hi), v| (lo.min(v[1]), hi.max(v[1])));
    let range = ((max_y - min_y) as f32).max(1.0);

    voxels
        .iter()
        .map(|v| {
            let t = (v[1] - min_y) as f32 / range;
            scale(base, 0.5 + 0.5 * t)
        })
        .collect()
}

fn radial_colors(voxels: &[VoxelCoord], dims: GridDims, base: Rgb) -> Vec<Rgb> {
    let center = [
        dims.nx as f32 / 2.0,
        dims.ny as f32 / 2.0,
        dims.nz as f32 / 2.0,
    ];

    let distances: Vec<f32> = voxels
        .iter()
        .map(|v| {
            let dx = v[0] as f32 - center[0];
            let dy = v[1] as f32 - center[1];
            let dz = v[2] as f32 - center[2];
            (dx * dx + dy * dy + dz * dz).sqrt()
        })
        .collect();
    let max_distance = distances.iter().copied().fold(1.0f32, f32::max);

    distances
        .iter()
        .map(|d| scale(base, 1.0 - 0.4 * (d / max_distance)))
        .collect()
}

fn density_colors(logits: &[f32], occupied_indices: &[usize], base: Rgb) -> Vec<Rgb> {
    let values: Vec<f32> = occupied_indices.iter().map(|&i| logits[i]).collect();
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &l| {
            (lo.min(l), hi.max(l))
        });
    let range = (max - min).max(DENSITY_EPSILON);

    values
        .iter()
        .map(|&l| scale(base, 0.4 + 0.6 * ((l - min) / range)))
        .collect()
}

fn scale(base: Rgb, factor: f32) -> Rgb {
    clamp_unit([base[0] * factor, base[1] * factor, base[2] * factor])
}

fn clamp_unit(color: Rgb) -> Rgb {
    // NaN channels (from NaN logits) collapse to 0
    color.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) })
}

/// Encodes a color as an R2G3B2 palette material (128-255).
///
/// 2 bits red, 3 bits green, 2 bits blue.
pub fn encode_r2g3b2(color: Rgb) -> u8 {
    let [r, g, b] = clamp_unit(color);
    let r_bits = (r * 3.0).round() as u8;
    let g_bits = (g * 7.0).round() as u8;
    let b_bits = (b * 3.0).round() as u8;

    128 + ((r_bits << 5) | (g_bits << 2) | b_bits)
}

/// Inverse of [`encode_r2g3b2`]. Materials below 128 are not palette colors.
pub fn decode_r2g3b2(material: u8) -> Option<Rgb> {
    if material < 128 {
        return None;
    }

    let bits = material - 128;
    let r_bits = (bits >> 5) & 0b11;
    let g_bits = (bits >> 2) & 0b111;
    let b_bits = bits & 0b11;

    Some([
        r_bits as f32 / 3.0,
        g_bits as f32 / 7.0,
        b_bits as f32 / 3.0,
    ])
}
