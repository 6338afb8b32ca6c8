//! Earth composites: clouds dropped onto the month's day, night and specular base textures.

use tracing::info;

use crate::assets::sources::StaticTextures;
use crate::clouds::compositor::SOFTEN_SIGMA;
use crate::effects::blur::gaussian_blur;
use crate::effects::composite::{over_opaque_in_place, scale_rgb_by};
use crate::effects::resample::resize_to;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::CloudResult;
use crate::foundation::math::multiply;

/// Strength of the cloud shadow on the day texture.
pub const SHADOW_OPACITY: f32 = 0.55;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EarthLayers {
    pub day: Raster,
    pub night: Raster,
    pub specular: Raster,
}

/// `255 - v` on every channel, alpha included.
pub fn invert(raster: &Raster) -> Raster {
    let mut out = raster.clone();
    out.data_mut().iter_mut().for_each(|v| *v = 255 - *v);
    out
}

/// Soft occlusion plane: the inverted cloud alpha, blurred.
pub fn shadow_plane(inverted: &Raster) -> CloudResult<Raster> {
    inverted.ensure_format(PixelFormat::Rgba8, "inverted cloud layer")?;
    gaussian_blur(&inverted.channel(3)?, SOFTEN_SIGMA)
}

/// Multiplier applied to the day texture for a given shadow alpha.
pub fn shadow_factor(shadow_alpha: u8) -> f32 {
    1.0 - (1.0 - f32::from(shadow_alpha) / 255.0) * SHADOW_OPACITY
}

/// Darken the day texture under the shadow, then lay the cloud layer over it.
pub fn compose_day(
    day_base: &Raster,
    shadow: &Raster,
    clouds_alpha: &Raster,
    geometry: Geometry,
) -> CloudResult<Raster> {
    shadow.ensure_format(PixelFormat::Gray8, "shadow plane")?;
    let base = resize_to(&day_base.to_format(PixelFormat::Rgb8), geometry)?;
    let shaded = scale_rgb_by(&base, shadow.data(), |c, s| f32::from(c) * shadow_factor(s))?;
    let mut canvas = shaded.to_format(PixelFormat::Rgba8);
    over_opaque_in_place(&mut canvas, clouds_alpha)?;
    Ok(canvas.to_format(PixelFormat::Rgb8))
}

/// Multiply a base texture by the inverted cloud alpha (`weights`, one byte per pixel).
pub fn compose_occluded(base: &Raster, weights: &Raster, geometry: Geometry) -> CloudResult<Raster> {
    weights.ensure_format(PixelFormat::Gray8, "occlusion weights")?;
    let base = resize_to(&base.to_format(PixelFormat::Rgb8), geometry)?;
    scale_rgb_by(&base, weights.data(), |c, w| multiply(f32::from(c), f32::from(w)))
}

#[tracing::instrument(skip(clouds_alpha, statics))]
pub fn compose_earth(
    clouds_alpha: &Raster,
    statics: &StaticTextures,
    geometry: Geometry,
) -> CloudResult<EarthLayers> {
    clouds_alpha.ensure_format(PixelFormat::Rgba8, "cloud alpha layer")?;
    clouds_alpha.ensure_geometry(geometry, "cloud alpha layer")?;

    let inverted = invert(clouds_alpha);
    let shadow = shadow_plane(&inverted)?;
    let occlusion = inverted.channel(3)?;

    let (day, (night, specular)) = rayon::join(
        || compose_day(&statics.day_base, &shadow, clouds_alpha, geometry),
        || {
            rayon::join(
                || compose_occluded(&statics.night_base, &occlusion, geometry),
                || compose_occluded(&statics.specular_base, &occlusion, geometry),
            )
        },
    );
    let layers = EarthLayers {
        day: day?,
        night: night?,
        specular: specular?,
    };
    info!("earth layers composed");
    Ok(layers)
}

#[cfg(test)]
#[path = "../../tests/unit/earth/compositor.rs"]
mod tests;
