use rayon::prelude::*;
use tracing::debug;

use crate::foundation::core::{Geometry, Raster};
use crate::foundation::error::{CloudError, CloudResult};

/// Exchange the left and right halves of every row. Applying it twice is the identity.
pub fn swap_halves(raster: &mut Raster) -> CloudResult<()> {
    if !raster.width().is_multiple_of(2) {
        return Err(CloudError::precondition(format!(
            "cannot swap halves of odd width {}",
            raster.width()
        )));
    }
    let half = raster.stride() / 2;
    let stride = raster.stride();
    raster
        .data_mut()
        .par_chunks_mut(stride)
        .for_each(|row| row.rotate_left(half));
    Ok(())
}

/// Replace both pole bands with vertically mirrored copies of the rows next to them.
///
/// With `m = height/8`, row `y < m` takes row `2m-1-y` and row `y >= height-m` takes row
/// `2·height-1-2m-y`. Source and destination rows never overlap.
pub fn mirror_poles(raster: &mut Raster, geometry: Geometry) -> CloudResult<()> {
    raster.ensure_geometry(geometry, "reassembled raster")?;
    let m = geometry.pole_band() as usize;
    let h = geometry.height as usize;
    let stride = raster.stride();
    let data = raster.data_mut();

    for y in 0..m {
        let src = 2 * m - 1 - y;
        data.copy_within(src * stride..(src + 1) * stride, y * stride);
    }
    for y in h - m..h {
        let src = 2 * h - 1 - 2 * m - y;
        data.copy_within(src * stride..(src + 1) * stride, y * stride);
    }
    debug!(band = m, "pole bands mirrored");
    Ok(())
}

/// Undo the merge-time half swap, then mirror the pole bands.
#[tracing::instrument(skip(raster))]
pub fn reassemble(raster: &mut Raster, geometry: Geometry) -> CloudResult<()> {
    raster.ensure_geometry(geometry, "reassembled raster")?;
    swap_halves(raster)?;
    mirror_poles(raster, geometry)
}

#[cfg(test)]
#[path = "../../tests/unit/clouds/hemisphere.rs"]
mod tests;
