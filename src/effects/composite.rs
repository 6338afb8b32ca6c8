use rayon::prelude::*;

use crate::foundation::core::{PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::foundation::math::{mul_div255_u8, to_u8};

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    let sa = u16::from(src[3]);
    let inv = 255u16 - sa;

    let mut out = [0u8; 4];
    out[3] = src[3].saturating_add(mul_div255_u8(u16::from(dst[3]), inv));
    for i in 0..3 {
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = src[i].saturating_add(dc);
    }
    out
}

/// Convert one straight-alpha pixel to premultiplied form.
pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    [
        mul_div255_u8(u16::from(px[0]), a),
        mul_div255_u8(u16::from(px[1]), a),
        mul_div255_u8(u16::from(px[2]), a),
        px[3],
    ]
}

/// Composite a straight-alpha RGBA layer over an opaque RGBA base, in place.
///
/// The base must be fully opaque, which makes its straight and premultiplied forms identical
/// and keeps the result opaque.
pub fn over_opaque_in_place(dst: &mut Raster, src: &Raster) -> CloudResult<()> {
    dst.ensure_format(PixelFormat::Rgba8, "composite destination")?;
    src.ensure_format(PixelFormat::Rgba8, "composite source")?;
    if dst.dimensions() != src.dimensions() {
        return Err(CloudError::precondition(format!(
            "composite layers differ in size: {:?} vs {:?}",
            dst.dimensions(),
            src.dimensions()
        )));
    }
    dst.data_mut()
        .par_chunks_exact_mut(4)
        .zip(src.data().par_chunks_exact(4))
        .for_each(|(d, s)| {
            let out = over(
                [d[0], d[1], d[2], d[3]],
                premultiply([s[0], s[1], s[2], s[3]]),
            );
            d.copy_from_slice(&out);
        });
    Ok(())
}

/// Recompute the RGB channels of an RGB raster from each channel value and the pixel's byte in
/// `weights`. Results are clamped and truncated.
pub fn scale_rgb_by<F>(base: &Raster, weights: &[u8], blend: F) -> CloudResult<Raster>
where
    F: Fn(u8, u8) -> f32 + Sync,
{
    base.ensure_format(PixelFormat::Rgb8, "scaled base")?;
    let pixels = base.width() as usize * base.height() as usize;
    if weights.len() != pixels {
        return Err(CloudError::precondition(format!(
            "weight plane has {} entries, base has {pixels} pixels",
            weights.len()
        )));
    }
    let mut out = base.clone();
    out.data_mut()
        .par_chunks_exact_mut(3)
        .zip(weights.par_iter())
        .for_each(|(px, &w)| {
            for c in px.iter_mut() {
                *c = to_u8(blend(*c, w));
            }
        });
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
