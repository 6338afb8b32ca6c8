//! Stereo channel merge: six hemisphere halves in, one cloud intensity field out.
//!
//! Halves are laid out right-half-first (`x < width/2` reads the right half, the rest reads
//! the left half). [`crate::clouds::hemisphere::swap_halves`] undoes that ordering later.

use rayon::prelude::*;
use tracing::info;

use crate::assets::sources::ChannelSources;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::foundation::math::{gamma, interpolate, screen, to_u8};

/// Intensity value marking a saturated pixel; the seam scan looks for it.
pub const SENTINEL: u8 = 255;

pub const IR_LOW: f32 = 72.0;
pub const IR_HIGH: f32 = 178.0;
pub const IR_GAMMA: f32 = 1.46;
pub const IR_WEIGHT: f32 = 0.77;
pub const COMBINED_GAMMA: f32 = 2.0;
pub const VISIBLE_GAMMA: f32 = 1.5;

const VISIBLE_MAX_RANGE: f32 = 25.0;
const VISIBLE_MAX_GB_DIFF: f32 = 11.0;
const VISIBLE_MIN_GREEN: f32 = 150.0;

/// Red channel masked by the inverted blue channel.
pub fn masked_red(r: u8, b: u8) -> f32 {
    let r = f32::from(r);
    let inv_b = 255.0 - f32::from(b);
    (r / 255.0) * (inv_b / 255.0) * 255.0
}

/// Dust contribution: masked red screened with half of the inverted blue channel.
pub fn dust_signal(r: u8, b: u8) -> f32 {
    let inv_b = 255.0 - f32::from(b);
    screen(masked_red(r, b), 0.5 * inv_b)
}

/// Linear remap of the raw IR value onto the full range, clamped outside `[72, 178]`.
pub fn ir_remap(raw: u8) -> f32 {
    interpolate(IR_LOW, IR_HIGH, 0.0, 255.0, f32::from(raw))
}

pub fn ir_signal(raw: u8) -> f32 {
    gamma(IR_GAMMA, ir_remap(raw))
}

/// Screen the weighted IR signal over the dust signal and gamma-correct the sum.
pub fn combine(dust: f32, ir: f32) -> f32 {
    gamma(COMBINED_GAMMA, screen(dust, IR_WEIGHT * ir))
}

/// Whether a visible pixel looks like cloud or snow rather than coloured land or sea.
pub fn visible_selected(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    max - min < VISIBLE_MAX_RANGE
        || (r < g && (g - b).abs() < VISIBLE_MAX_GB_DIFF && g > VISIBLE_MIN_GREEN)
}

/// Final intensity for one pixel from its IR, dust and visible RGB samples.
pub fn blend_pixel(ir: &[u8], dust: &[u8], visible: &[u8]) -> u8 {
    let combined = combine(dust_signal(dust[0], dust[2]), ir_signal(ir[0]));
    let (r, g, b) = (visible[0], visible[1], visible[2]);
    let value = if visible_selected(r, g, b) {
        let brightest = r.max(g).max(b);
        gamma(VISIBLE_GAMMA, f32::from(brightest)).max(combined)
    } else {
        combined
    };
    to_u8(value)
}

/// Two hemisphere halves read as one merged raster, right half first.
#[derive(Clone, Copy, Debug)]
pub struct MergedPair<'a> {
    right: &'a Raster,
    left: &'a Raster,
}

impl<'a> MergedPair<'a> {
    pub fn new(left: &'a Raster, right: &'a Raster, geometry: Geometry, what: &str) -> CloudResult<Self> {
        let side = geometry.height;
        for (half, name) in [(left, "left"), (right, "right")] {
            half.ensure_format(PixelFormat::Rgb8, what)?;
            if half.dimensions() != (side, side) {
                return Err(CloudError::precondition(format!(
                    "{what} {name} half is {}x{}, expected {side}x{side}",
                    half.width(),
                    half.height()
                )));
            }
        }
        Ok(Self { right, left })
    }

    /// The two half rows in merged order.
    fn row_halves(&self, y: u32) -> [&'a [u8]; 2] {
        [self.right.row(y), self.left.row(y)]
    }
}

/// Blend the six channel halves into a `Gray8` intensity field of the working geometry.
#[tracing::instrument(skip(sources))]
pub fn blend_channels(sources: &ChannelSources, geometry: Geometry) -> CloudResult<Raster> {
    geometry.validate()?;
    let ir = MergedPair::new(&sources.ir_left, &sources.ir_right, geometry, "ir")?;
    let dust = MergedPair::new(&sources.dust_left, &sources.dust_right, geometry, "dust")?;
    let visible = MergedPair::new(
        &sources.visible_left,
        &sources.visible_right,
        geometry,
        "visible",
    )?;

    let width = geometry.width as usize;
    let mut out = vec![0u8; geometry.pixel_count()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, dst)| {
        let y = y as u32;
        let ir_rows = ir.row_halves(y);
        let dust_rows = dust.row_halves(y);
        let vis_rows = visible.row_halves(y);
        let half = width / 2;
        for (side, dst_half) in dst.chunks_mut(half).enumerate() {
            let pixels = ir_rows[side]
                .chunks_exact(3)
                .zip(dust_rows[side].chunks_exact(3))
                .zip(vis_rows[side].chunks_exact(3));
            for (d, ((i, du), v)) in dst_half.iter_mut().zip(pixels) {
                *d = blend_pixel(i, du, v);
            }
        }
    });

    let saturated = out.iter().filter(|&&v| v == SENTINEL).count();
    info!(saturated, "channels blended");
    Raster::new(geometry.width, geometry.height, PixelFormat::Gray8, out)
}

#[cfg(test)]
#[path = "../../tests/unit/clouds/channels.rs"]
mod tests;
