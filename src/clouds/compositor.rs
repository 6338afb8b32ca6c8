use rayon::prelude::*;
use tracing::info;

use crate::effects::blur::gaussian_blur;
use crate::effects::composite::over_opaque_in_place;
use crate::effects::resample::resize_to;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::CloudResult;

/// Blur sigma shared by the edge glow and the earth shadow.
pub const SOFTEN_SIGMA: f32 = 3.0;
/// Additive brightening applied to the blurred cloud field (half of full range, truncated).
pub const GLOW_LIFT: u8 = 127;

/// The two published cloud artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudLayers {
    /// Opaque `Rgb8` cloud map.
    pub clouds: Raster,
    /// `Rgba8` edge-glow layer whose alpha is the cloud intensity.
    pub clouds_alpha: Raster,
}

/// Resize the frame mask to the working geometry as straight-alpha RGBA.
pub fn resize_frame(frame: &Raster, geometry: Geometry) -> CloudResult<Raster> {
    resize_to(&frame.to_format(PixelFormat::Rgba8), geometry)
}

/// Lay the resized frame over the reassembled field, giving an opaque `Rgba8` map.
pub fn frame_cloud_field(field: &Raster, frame: &Raster) -> CloudResult<Raster> {
    field.ensure_format(PixelFormat::Gray8, "intensity field")?;
    let mut framed = field.to_format(PixelFormat::Rgba8);
    over_opaque_in_place(&mut framed, frame)?;
    Ok(framed)
}

/// Split an opaque framed map into the flat cloud map and the glow/alpha variant.
pub fn derive_layers(framed: &Raster) -> CloudResult<CloudLayers> {
    framed.ensure_format(PixelFormat::Rgba8, "framed cloud map")?;
    let clouds = framed.to_format(PixelFormat::Rgb8);
    let intensity = framed.channel(0)?;
    let glow = gaussian_blur(&intensity, SOFTEN_SIGMA)?;

    let mut data = vec![0u8; intensity.data().len() * 4];
    data.par_chunks_exact_mut(4)
        .zip(intensity.data().par_iter().zip(glow.data().par_iter()))
        .for_each(|(px, (&alpha, &g))| {
            let lifted = g.saturating_add(GLOW_LIFT);
            px.copy_from_slice(&[lifted, lifted, lifted, alpha]);
        });
    let clouds_alpha = Raster::new(framed.width(), framed.height(), PixelFormat::Rgba8, data)?;
    Ok(CloudLayers {
        clouds,
        clouds_alpha,
    })
}

/// Frame the reassembled intensity field and derive both cloud layers.
#[tracing::instrument(skip(field, frame))]
pub fn compose_cloud_layers(
    field: &Raster,
    frame: &Raster,
    geometry: Geometry,
) -> CloudResult<CloudLayers> {
    field.ensure_geometry(geometry, "intensity field")?;
    let frame = resize_frame(frame, geometry)?;
    let framed = frame_cloud_field(field, &frame)?;
    let layers = derive_layers(&framed)?;
    info!("cloud layers composed");
    Ok(layers)
}

#[cfg(test)]
#[path = "../../tests/unit/clouds/compositor.rs"]
mod tests;
