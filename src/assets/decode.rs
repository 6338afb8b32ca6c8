use anyhow::Context;

use crate::foundation::core::{PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};

/// Decode an encoded image (PNG, JPEG, ...) into a raster of the requested format.
pub fn decode_raster(bytes: &[u8], format: PixelFormat) -> CloudResult<Raster> {
    if bytes.is_empty() {
        return Err(CloudError::acquisition("image buffer is empty"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| CloudError::acquisition(format!("{e:#}")))?;
    let (width, height, data) = match format {
        PixelFormat::Gray8 => {
            let img = dyn_img.to_luma8();
            let (w, h) = img.dimensions();
            (w, h, img.into_raw())
        }
        PixelFormat::Rgb8 => {
            let img = dyn_img.to_rgb8();
            let (w, h) = img.dimensions();
            (w, h, img.into_raw())
        }
        PixelFormat::Rgba8 => {
            let img = dyn_img.to_rgba8();
            let (w, h) = img.dimensions();
            (w, h, img.into_raw())
        }
    };
    Raster::new(width, height, format, data)
}

/// Decode and require exact dimensions.
pub fn decode_sized(
    bytes: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> CloudResult<Raster> {
    let raster = decode_raster(bytes, format)?;
    if raster.dimensions() != (width, height) {
        return Err(CloudError::acquisition(format!(
            "expected {width}x{height}, decoded {}x{}",
            raster.width(),
            raster.height()
        )));
    }
    Ok(raster)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
