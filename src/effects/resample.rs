use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, Rgba};
use rayon::prelude::*;

use crate::effects::composite::premultiply;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};

/// High-quality (Lanczos3) resize used everywhere a raster changes size.
///
/// `Rgba8` rasters are filtered in premultiplied form so colour under transparent pixels does
/// not leak into their neighbours.
pub fn resize(src: &Raster, width: u32, height: u32) -> CloudResult<Raster> {
    if width == 0 || height == 0 {
        return Err(CloudError::precondition(format!(
            "cannot resize to {width}x{height}"
        )));
    }
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }
    let (w, h) = src.dimensions();
    let out = match src.format() {
        PixelFormat::Gray8 => {
            resize_buffer::<Luma<u8>>(w, h, src.data().to_vec(), width, height)?
        }
        PixelFormat::Rgb8 => resize_buffer::<Rgb<u8>>(w, h, src.data().to_vec(), width, height)?,
        PixelFormat::Rgba8 => {
            let mut data = src.data().to_vec();
            data.par_chunks_exact_mut(4).for_each(|px| {
                let p = premultiply([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&p);
            });
            let mut out = resize_buffer::<Rgba<u8>>(w, h, data, width, height)?;
            out.par_chunks_exact_mut(4).for_each(unpremultiply);
            out
        }
    };
    Raster::new(width, height, src.format(), out)
}

/// Resize to the working geometry.
pub fn resize_to(src: &Raster, geometry: Geometry) -> CloudResult<Raster> {
    resize(src, geometry.width, geometry.height)
}

/// Back to straight alpha, in place. Filter overshoot is clamped.
fn unpremultiply(px: &mut [u8]) {
    let a = u32::from(px[3]);
    if a == 0 {
        px[..3].fill(0);
        return;
    }
    for c in &mut px[..3] {
        *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
    }
}

fn resize_buffer<P>(w: u32, h: u32, data: Vec<u8>, width: u32, height: u32) -> CloudResult<Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let buf = ImageBuffer::<P, Vec<u8>>::from_raw(w, h, data)
        .ok_or_else(|| CloudError::precondition("raster buffer does not match its dimensions"))?;
    Ok(imageops::resize(&buf, width, height, FilterType::Lanczos3).into_raw())
}

#[cfg(test)]
#[path = "../../tests/unit/effects/resample.rs"]
mod tests;
